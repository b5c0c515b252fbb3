//! Commuter line served by the train.

/// Index into [`STATIONS`].
pub type StationIndex = u8;

/// Stops on the line, in travel order.
pub const STATIONS: [&str; 8] = [
    "Harbor Gate",
    "Mill Street",
    "Central Exchange",
    "Union Square",
    "Riverside",
    "Old Observatory",
    "Parkway North",
    "Terminal Heights",
];

/// Index of the final stop.
#[must_use]
pub const fn last_station_index() -> StationIndex {
    // The line is a compile-time constant far below u8::MAX stops.
    #[allow(clippy::cast_possible_truncation)]
    let last = (STATIONS.len() - 1) as StationIndex;
    last
}

/// Display name for a station, if the index is on the line.
#[must_use]
pub fn station_name(index: StationIndex) -> Option<&'static str> {
    STATIONS.get(usize::from(index)).copied()
}

/// Whether `boarding -> destination` is a valid forward trip on this line.
#[must_use]
pub const fn is_valid_route(boarding: StationIndex, destination: StationIndex) -> bool {
    boarding < destination && destination <= last_station_index()
}
