//! Names of the system fields every indexed document may carry.

use chrono::NaiveDateTime;

/// Numeric record identifier.
pub const ID: &str = "ID";
/// Identifier of the parent record, for hierarchical types.
pub const PARENT_ID: &str = "ParentID";
/// Creation timestamp.
pub const CREATED: &str = "Created";
/// Last modification timestamp.
pub const LAST_EDITED: &str = "LastEdited";
/// Sort order among siblings.
pub const SORT: &str = "Sort";
/// Display name.
pub const TITLE: &str = "Title";
/// Visibility flag.
pub const SHOW_IN_SEARCH: &str = "ShowInSearch";
/// Type ancestry, most-general first.
pub const CLASS_NAME_HIERARCHY: &str = "ClassNameHierarchy";
/// Ancestor record identifiers, nearest parent first.
pub const PARENTS_HIERARCHY: &str = "ParentsHierarchy";
/// Concrete record type.
pub const CLASS_NAME: &str = "ClassName";
/// Stage tags.
pub const STAGE: &str = "SS_Stage";

/// The record store's datetime serialization format.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date format string sent with date mappings, matching [`DATE_FORMAT`] and
/// falling back to plain dates and ISO-8601.
pub const ENGINE_DATE_FORMAT: &str = "yyyy-MM-dd HH:mm:ss||yyyy-MM-dd||strict_date_optional_time";

/// Format a timestamp the way the record store serializes it.
pub fn format_date(value: &NaiveDateTime) -> String {
    value.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_format_date() {
        let value = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 0)
            .unwrap();

        assert_eq!(format_date(&value), "2024-03-09 07:05:00");
    }
}
