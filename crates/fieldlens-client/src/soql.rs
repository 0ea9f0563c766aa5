//! SOQL literal helpers.

/// Escape a value for use inside a single-quoted SOQL literal, including
/// `LIKE` patterns.
#[must_use]
pub fn escape_soql(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Quoted, escaped, comma-joined list for an `IN (...)` clause.
#[must_use]
pub fn in_list<'a>(values: impl IntoIterator<Item = &'a str>) -> String {
    values
        .into_iter()
        .map(|value| format!("'{}'", escape_soql(value)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Percent-encode a query for the `q=` parameter.
#[must_use]
pub fn encode_query(soql: &str) -> String {
    urlencoding::encode(soql).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_quotes_and_backslashes() {
        assert_eq!(escape_soql("O'Brien"), "O\\'Brien");
        assert_eq!(escape_soql(r"a\b"), r"a\\b");
        assert_eq!(escape_soql("Custom_Status__c"), "Custom_Status__c");
    }

    #[test]
    fn test_in_list() {
        assert_eq!(in_list(["0PS1", "0PS'2"]), "'0PS1','0PS\\'2'");
    }

    #[test]
    fn test_encode_query() {
        assert_eq!(
            encode_query("SELECT Id FROM ApexClass WHERE Name = 'X'"),
            "SELECT%20Id%20FROM%20ApexClass%20WHERE%20Name%20%3D%20%27X%27"
        );
    }
}
