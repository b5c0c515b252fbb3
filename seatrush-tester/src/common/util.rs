pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_trims_and_filters() {
        let parts = split_csv(" easy, ,rush,  normal ");
        assert_eq!(parts, vec!["easy", "rush", "normal"]);
        assert!(split_csv(" , ").is_empty());
    }
}
