//! Static rate tables, whole US dollars.

/// Base premium keyed by coverage level.
pub(crate) const BASE_PREMIUMS: [(u8, u32); 10] = [
    (1, 160),
    (2, 200),
    (3, 250),
    (4, 300),
    (5, 355),
    (6, 450),
    (7, 505),
    (8, 560),
    (9, 630),
    (10, 705),
];

/// Third-party liability premium keyed by liability option.
pub(crate) const LIABILITY_PREMIUMS: [(&str, u32); 7] = [
    ("none", 0),
    ("option1", 195),
    ("option2", 210),
    ("option3", 240),
    ("option4", 250),
    ("option5", 275),
    ("option6", 300),
];

/// Host liquor liability premium keyed by guest range.
pub(crate) const LIQUOR_LIABILITY_PREMIUMS: [(&str, u32); 8] = [
    ("1-50", 65),
    ("51-100", 65),
    ("101-150", 85),
    ("151-200", 85),
    ("201-250", 100),
    ("251-300", 100),
    ("301-350", 150),
    ("351-400", 150),
];
