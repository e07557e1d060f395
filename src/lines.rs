/// Station keywords per MBTA rapid-transit line.
///
/// A station is assigned a line when its name contains one of the keywords,
/// ignoring case. Transfer stations appear under several lines; the last
/// matching line in this table wins.
static LINE_STATIONS: &[(&str, &[&str])] = &[
    (
        "Red",
        &[
            "Alewife",
            "Davis",
            "Porter",
            "Harvard",
            "Central",
            "Kendall",
            "Charles/MGH",
            "Park Street",
            "Downtown Crossing",
            "South Station",
            "Broadway",
            "Andrew",
            "JFK/UMass",
            "Savin Hill",
            "Fields Corner",
            "Shawmut",
            "Ashmont",
            "North Quincy",
            "Wollaston",
            "Quincy Center",
            "Quincy Adams",
            "Braintree",
        ],
    ),
    (
        "Green",
        &[
            "Lechmere",
            "Science Park",
            "North Station",
            "Haymarket",
            "Government Center",
            "Park Street",
            "Boylston",
            "Arlington",
            "Copley",
            "Hynes",
            "Kenmore",
            "Prudential",
            "Symphony",
            "Northeastern",
            "Museum of Fine Arts",
            "Longwood Medical Area",
            "Brigham Circle",
            "Fenwood Road",
            "Mission Park",
            "Riverway",
            "Back of the Hill",
            "Heath Street",
            "Cleveland Circle",
            "Beaconsfield",
            "Reservoir",
            "Chestnut Hill",
            "Newton Centre",
            "Boston College",
        ],
    ),
    (
        "Orange",
        &[
            "Oak Grove",
            "Malden Center",
            "Wellington",
            "Assembly",
            "Sullivan Square",
            "Community College",
            "North Station",
            "Haymarket",
            "State",
            "Downtown Crossing",
            "Chinatown",
            "Tufts Medical Center",
            "Back Bay",
            "Massachusetts Avenue",
            "Ruggles",
            "Roxbury Crossing",
            "Jackson Square",
            "Stony Brook",
            "Green Street",
            "Forest Hills",
        ],
    ),
    (
        "Blue",
        &[
            "Wonderland",
            "Revere Beach",
            "Beachmont",
            "Suffolk Downs",
            "Orient Heights",
            "Wood Island",
            "Airport",
            "Maverick",
            "Aquarium",
            "State",
            "Government Center",
            "Bowdoin",
        ],
    ),
    ("Silver", &["South Station", "Courthouse", "World Trade Center"]),
];

pub const OTHER_LINE: &str = "Other";

/// Returns the line color for `station`, or [`OTHER_LINE`] if none matches.
pub fn line_for(station: &str) -> &'static str {
    let station = station.to_lowercase();
    LINE_STATIONS
        .iter()
        .filter(|(_, keywords)| {
            keywords
                .iter()
                .any(|k| station.contains(&k.to_lowercase()))
        })
        .map(|(line, _)| *line)
        .last()
        .unwrap_or(OTHER_LINE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_for_single_line_stations() {
        assert_eq!(line_for("Alewife"), "Red");
        assert_eq!(line_for("Kenmore"), "Green");
        assert_eq!(line_for("Forest Hills"), "Orange");
        assert_eq!(line_for("Wonderland"), "Blue");
    }

    #[test]
    fn test_line_for_is_case_insensitive_substring() {
        assert_eq!(line_for("KENDALL/MIT"), "Red");
        assert_eq!(line_for("Hynes Convention Center"), "Green");
    }

    #[test]
    fn test_transfer_station_takes_last_line() {
        assert_eq!(line_for("Park Street"), "Green");
        assert_eq!(line_for("Downtown Crossing"), "Orange");
        assert_eq!(line_for("State Street"), "Blue");
        assert_eq!(line_for("South Station"), "Silver");
    }

    #[test]
    fn test_unknown_station() {
        assert_eq!(line_for("Medford/Tufts"), OTHER_LINE);
    }
}
