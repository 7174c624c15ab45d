//! Command Catalog
//!
//! A static, declarative table mapping (category, command) to everything the
//! console needs to run it: the ordered field schema, the statement template,
//! the result column labels and the notices shown to the operator.
//!
//! # Statement Templates
//! Templates are opaque, driver-level SQL with positional `$n` placeholders.
//! - [`Statement::Fixed`] binds every field, in field order.
//! - [`Statement::Search`] uses a choice field to pick one of several
//!   templates and binds the search term as its single parameter.
//!
//! The catalog is immutable and lives for the whole process. Lookups are exact
//! and case-sensitive and return `None` rather than failing.

use serde::Serialize;

use crate::error::{ConsoleError, Result};

/// Kind of input a field accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text
    Text,
    /// Free text that must parse as a number on submission
    Number,
    /// `YYYY-MM-DD`
    Date,
    /// Keystroke-gated time of day, normalized to `HH:MM:SS`
    TimeOfDay,
    /// One of a fixed set of values
    Choice,
}

/// One input of a command form
#[derive(Debug, Clone, Serialize)]
pub struct FieldSpec {
    /// Stable identifier (matches the column the value ends up in)
    pub id: &'static str,

    /// Label shown next to the control
    pub label: &'static str,

    pub kind: FieldKind,

    /// Allowed values for `Choice` fields, in display order
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub choices: &'static [&'static str],

    /// Pre-selected choice for `Choice` fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<&'static str>,

    pub required: bool,

    /// Decimal places a `Number` value is formatted with on submission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<usize>,
}

impl FieldSpec {
    /// Required free-text field
    #[must_use]
    pub const fn text(id: &'static str, label: &'static str) -> Self {
        Self::new(id, label, FieldKind::Text)
    }

    /// Required numeric field
    #[must_use]
    pub const fn number(id: &'static str, label: &'static str) -> Self {
        Self::new(id, label, FieldKind::Number)
    }

    /// Required date field
    #[must_use]
    pub const fn date(id: &'static str, label: &'static str) -> Self {
        Self::new(id, label, FieldKind::Date)
    }

    /// Required time-of-day field
    #[must_use]
    pub const fn time_of_day(id: &'static str, label: &'static str) -> Self {
        Self::new(id, label, FieldKind::TimeOfDay)
    }

    /// Choice field with a pre-selected default
    #[must_use]
    pub const fn choice(
        id: &'static str,
        label: &'static str,
        choices: &'static [&'static str],
        default: &'static str,
    ) -> Self {
        Self { choices, default: Some(default), ..Self::new(id, label, FieldKind::Choice) }
    }

    /// Format a `Number` field's value with a fixed number of decimals
    #[must_use]
    pub const fn with_scale(self, scale: usize) -> Self {
        Self { scale: Some(scale), ..self }
    }

    const fn new(id: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self { id, label, kind, choices: &[], default: None, required: true, scale: None }
    }
}

/// How a search term is turned into its bound parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TermMatch {
    /// Bind the term as typed
    Exact,
    /// Bind `%term%` for a substring `ILIKE`
    Contains,
}

impl TermMatch {
    /// Build the bound parameter for a raw search term
    #[must_use]
    pub fn pattern(self, term: &str) -> String {
        match self {
            Self::Exact => term.to_string(),
            Self::Contains => format!("%{term}%"),
        }
    }
}

/// One template of a search command
#[derive(Debug, Clone, Serialize)]
pub struct SearchVariant {
    /// Choice value that selects this template
    pub choice: &'static str,
    pub sql: &'static str,
    pub matching: TermMatch,
}

/// Statement template owned by a command
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Statement {
    /// One placeholder per field, bound in field order
    Fixed { sql: &'static str },

    /// `selector` picks the template, `term` is the single bound parameter
    Search { term: &'static str, selector: &'static str, variants: &'static [SearchVariant] },
}

/// Everything needed to run one catalog command
#[derive(Debug, Clone, Serialize)]
pub struct CommandSpec {
    pub category: &'static str,
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
    pub statement: Statement,

    /// Whether the statement returns rows to present
    pub expects_rows: bool,

    /// Header labels of the result grid
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub result_columns: &'static [&'static str],

    /// Title of the result popup
    pub result_title: &'static str,

    /// Notice shown after a successful mutating statement
    #[serde(skip_serializing_if = "str::is_empty")]
    pub success_notice: &'static str,

    /// Prefix of the error notice when execution fails
    pub failure_context: &'static str,

    /// Error notice replacing an empty result grid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_notice: Option<&'static str>,
}

/// A resolved statement, ready for the execution gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundStatement {
    pub sql: &'static str,
    pub params: Vec<String>,
    pub title: String,
}

impl CommandSpec {
    /// Position of a field in the form
    #[must_use]
    pub fn field_index(&self, id: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.id == id)
    }

    /// Turn submitted form values (in field order) into a bound statement
    pub fn bind(&self, values: &[String]) -> Result<BoundStatement> {
        if values.len() != self.fields.len() {
            return Err(ConsoleError::validation(format!(
                "'{}' expects {} values, got {}",
                self.name,
                self.fields.len(),
                values.len()
            )));
        }

        match &self.statement {
            Statement::Fixed { sql } => Ok(BoundStatement {
                sql: *sql,
                params: values.to_vec(),
                title: self.result_title.to_string(),
            }),

            Statement::Search { term, selector, variants } => {
                let term_value = self.value_of(values, term)?;
                let choice = self.value_of(values, selector)?;

                let variant = variants.iter().find(|v| v.choice == choice).ok_or_else(|| {
                    ConsoleError::validation(format!("'{choice}' is not a valid search option"))
                })?;

                Ok(BoundStatement {
                    sql: variant.sql,
                    params: vec![variant.matching.pattern(term_value)],
                    title: format!("{} ({choice})", self.result_title),
                })
            }
        }
    }

    fn value_of<'a>(&self, values: &'a [String], id: &str) -> Result<&'a str> {
        self.field_index(id)
            .and_then(|idx| values.get(idx))
            .map(String::as_str)
            .ok_or_else(|| ConsoleError::lookup(format!("Unknown field '{id}' in '{}'", self.name)))
    }
}

/// A named group of commands
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub name: &'static str,
    pub commands: &'static [CommandSpec],
}

/// The full, read-only command table
#[derive(Debug, Serialize)]
pub struct Catalog {
    pub categories: &'static [Category],
}

impl Catalog {
    /// Category names in display order
    pub fn categories(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.categories.iter().map(|category| category.name)
    }

    /// Command names of a category in display order (empty if unknown)
    #[must_use]
    pub fn commands_for(&self, category: &str) -> Vec<&'static str> {
        self.category(category)
            .map(|c| c.commands.iter().map(|command| command.name).collect())
            .unwrap_or_default()
    }

    /// Look up one command
    #[must_use]
    pub fn spec_for(&self, category: &str, name: &str) -> Option<&'static CommandSpec> {
        self.category(category)?.commands.iter().find(|command| command.name == name)
    }

    #[must_use]
    pub fn category(&self, name: &str) -> Option<&'static Category> {
        self.categories.iter().find(|category| category.name == name)
    }
}

/// Number of distinct positional placeholders (`$1`, `$2`, ...) in a template
#[must_use]
pub fn placeholder_count(sql: &str) -> usize {
    let bytes = sql.as_bytes();
    let mut highest = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        if bytes[idx] == b'$' {
            let start = idx + 1;
            let mut end = start;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if let Ok(n) = sql[start..end].parse::<usize>() {
                highest = highest.max(n);
            }
            idx = end.max(start);
        } else {
            idx += 1;
        }
    }

    highest
}

/// The process-wide catalog
#[must_use]
pub fn catalog() -> &'static Catalog {
    &CATALOG
}

const STUDENT_COLUMNS: &[&str] = &["Student ID", "Name", "Email"];
const EXAM_COLUMNS: &[&str] = &["Code", "Title", "Location", "Date", "Time"];

static CATALOG: Catalog = Catalog {
    categories: &[
        Category { name: "Student Management", commands: STUDENT_COMMANDS },
        Category { name: "Exam Management", commands: EXAM_COMMANDS },
        Category { name: "Entry Management", commands: ENTRY_COMMANDS },
    ],
};

const STUDENT_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        category: "Student Management",
        name: "Add Student",
        fields: &[
            FieldSpec::number("sno", "Student Number"),
            FieldSpec::text("sname", "Student Name"),
            FieldSpec::text("semail", "Student Email"),
        ],
        statement: Statement::Fixed {
            sql: "INSERT INTO student (sno, sname, semail) VALUES ($1, $2, $3)",
        },
        expects_rows: false,
        result_columns: &[],
        result_title: "Add Student",
        success_notice: "Student added successfully!",
        failure_context: "Failed to add student",
        empty_notice: None,
    },
    CommandSpec {
        category: "Student Management",
        name: "Delete Student",
        fields: &[FieldSpec::number("sno", "Student Number")],
        statement: Statement::Fixed { sql: "DELETE FROM student WHERE sno = $1" },
        expects_rows: false,
        result_columns: &[],
        result_title: "Delete Student",
        success_notice: "Student deleted successfully!",
        failure_context: "Failed to delete student",
        empty_notice: None,
    },
    CommandSpec {
        category: "Student Management",
        name: "Search Student By Email/ID/Name",
        fields: &[
            FieldSpec::text("term", "Search Term"),
            FieldSpec::choice("search_by", "Search By", &["Email", "ID", "Name"], "ID"),
        ],
        statement: Statement::Search {
            term: "term",
            selector: "search_by",
            variants: &[
                SearchVariant {
                    choice: "Email",
                    sql: "SELECT sno, sname, semail FROM student WHERE semail ILIKE $1",
                    matching: TermMatch::Exact,
                },
                SearchVariant {
                    choice: "ID",
                    sql: "SELECT sno, sname, semail FROM student WHERE sno = $1",
                    matching: TermMatch::Exact,
                },
                SearchVariant {
                    choice: "Name",
                    sql: "SELECT sno, sname, semail FROM student WHERE sname ILIKE $1",
                    matching: TermMatch::Contains,
                },
            ],
        },
        expects_rows: true,
        result_columns: STUDENT_COLUMNS,
        result_title: "Search Results",
        success_notice: "",
        failure_context: "Failed to search students",
        empty_notice: Some("No students found matching the criteria"),
    },
    CommandSpec {
        category: "Student Management",
        name: "View Students",
        fields: &[],
        statement: Statement::Fixed { sql: "SELECT sno, sname, semail FROM student ORDER BY sno" },
        expects_rows: true,
        result_columns: STUDENT_COLUMNS,
        result_title: "View Students",
        success_notice: "",
        failure_context: "Failed to show students",
        empty_notice: None,
    },
    CommandSpec {
        category: "Student Management",
        name: "View Student Timetable",
        fields: &[FieldSpec::number("sno", "Student Number")],
        statement: Statement::Fixed { sql: "SELECT * FROM getStudentTimetable($1)" },
        expects_rows: true,
        result_columns: &["Name", "Code", "Title", "Location", "Date", "Time"],
        result_title: "Student Timetable",
        success_notice: "",
        failure_context: "Failed to get student timetable",
        empty_notice: None,
    },
];

const EXAM_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        category: "Exam Management",
        name: "Add New Exam",
        fields: &[
            FieldSpec::text("excode", "Exam Code"),
            FieldSpec::text("extitle", "Exam Title"),
            FieldSpec::text("exlocation", "Exam Location"),
            FieldSpec::date("exdate", "Exam Date"),
            FieldSpec::time_of_day("extime", "Exam Time"),
        ],
        statement: Statement::Fixed {
            sql: "INSERT INTO exam (excode, extitle, exlocation, exdate, extime) \
                  VALUES ($1, $2, $3, $4, $5)",
        },
        expects_rows: false,
        result_columns: &[],
        result_title: "Add New Exam",
        success_notice: "Exam added successfully!",
        failure_context: "Failed to add exam",
        empty_notice: None,
    },
    CommandSpec {
        category: "Exam Management",
        name: "Delete Exam",
        fields: &[FieldSpec::text("excode", "Exam Code")],
        statement: Statement::Fixed { sql: "DELETE FROM exam WHERE excode = $1" },
        expects_rows: false,
        result_columns: &[],
        result_title: "Delete Exam",
        success_notice: "Exam deleted successfully!",
        failure_context: "Failed to delete exam",
        empty_notice: None,
    },
    CommandSpec {
        category: "Exam Management",
        name: "View Exam Schedule",
        fields: &[],
        statement: Statement::Fixed {
            sql: "SELECT excode, extitle, exlocation, exdate, extime FROM exam \
                  ORDER BY exdate, extime",
        },
        expects_rows: true,
        result_columns: EXAM_COLUMNS,
        result_title: "View Exam Schedule",
        success_notice: "",
        failure_context: "Failed to get exam schedule",
        empty_notice: None,
    },
    CommandSpec {
        category: "Exam Management",
        name: "Search Exam By Title/Code",
        fields: &[
            FieldSpec::text("term", "Search Term"),
            FieldSpec::choice("search_by", "Search By", &["Title", "Code"], "Code"),
        ],
        statement: Statement::Search {
            term: "term",
            selector: "search_by",
            variants: &[
                SearchVariant {
                    choice: "Title",
                    sql: "SELECT excode, extitle, exlocation, exdate, extime FROM exam \
                          WHERE extitle ILIKE $1",
                    matching: TermMatch::Contains,
                },
                SearchVariant {
                    choice: "Code",
                    sql: "SELECT excode, extitle, exlocation, exdate, extime FROM exam \
                          WHERE excode ILIKE $1",
                    matching: TermMatch::Contains,
                },
            ],
        },
        expects_rows: true,
        result_columns: EXAM_COLUMNS,
        result_title: "Search Results",
        success_notice: "",
        failure_context: "Failed to search exams",
        empty_notice: Some("No exams found matching the criteria"),
    },
    CommandSpec {
        category: "Exam Management",
        name: "View Results For Exam",
        fields: &[FieldSpec::text("excode", "Exam Code")],
        statement: Statement::Fixed { sql: "SELECT * FROM getResultsForExam($1)" },
        expects_rows: true,
        result_columns: &["Code", "Title", "Student ID", "Name", "Grade", "Result"],
        result_title: "Exam Results",
        success_notice: "",
        failure_context: "Failed to get exam results",
        empty_notice: None,
    },
];

const ENTRY_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        category: "Entry Management",
        name: "Create Entry",
        fields: &[
            FieldSpec::number("eno", "Entry ID"),
            FieldSpec::number("sno", "Student Number"),
            FieldSpec::text("excode", "Exam Code"),
        ],
        statement: Statement::Fixed {
            sql: "INSERT INTO entry (eno, sno, excode) VALUES ($1, $2, $3)",
        },
        expects_rows: false,
        result_columns: &[],
        result_title: "Create Entry",
        success_notice: "Entry created successfully!",
        failure_context: "Failed to create entry",
        empty_notice: None,
    },
    CommandSpec {
        category: "Entry Management",
        name: "Cancel Entry",
        fields: &[FieldSpec::number("eno", "Entry Number")],
        statement: Statement::Fixed { sql: "SELECT cancelEntry($1)" },
        expects_rows: false,
        result_columns: &[],
        result_title: "Cancel Entry",
        success_notice: "Entry cancelled successfully!",
        failure_context: "Failed to cancel entry",
        empty_notice: None,
    },
    CommandSpec {
        category: "Entry Management",
        name: "Update Grade",
        fields: &[
            FieldSpec::number("eno", "Entry Number"),
            FieldSpec::number("egrade", "Grade").with_scale(2),
        ],
        statement: Statement::Fixed { sql: "SELECT updateEntryGrade($1, $2)" },
        expects_rows: false,
        result_columns: &[],
        result_title: "Update Grade",
        success_notice: "Grade updated successfully!",
        failure_context: "Failed to update grade",
        empty_notice: None,
    },
    CommandSpec {
        category: "Entry Management",
        name: "View Entries",
        fields: &[],
        statement: Statement::Fixed {
            sql: "SELECT eno, excode, sno, egrade FROM entry ORDER BY eno",
        },
        expects_rows: true,
        result_columns: &["ID", "Exam Code", "Student ID", "Grade"],
        result_title: "View Entries",
        success_notice: "",
        failure_context: "Failed to get entries",
        empty_notice: None,
    },
    CommandSpec {
        category: "Entry Management",
        name: "View Cancelled Entries",
        fields: &[],
        statement: Statement::Fixed {
            sql: "SELECT eno, excode, sno, cdate, cuser FROM cancel ORDER BY eno",
        },
        expects_rows: true,
        result_columns: &["ID", "Exam Code", "Student ID", "Cancelled On", "Cancelled By"],
        result_title: "View Cancelled Entries",
        success_notice: "",
        failure_context: "Failed to get cancelled entries",
        empty_notice: None,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_display_order() {
        let names: Vec<_> = catalog().categories().collect();
        assert_eq!(names, vec!["Student Management", "Exam Management", "Entry Management"]);
    }

    #[test]
    fn test_command_display_order() {
        assert_eq!(
            catalog().commands_for("Student Management"),
            vec![
                "Add Student",
                "Delete Student",
                "Search Student By Email/ID/Name",
                "View Students",
                "View Student Timetable",
            ]
        );
        assert_eq!(
            catalog().commands_for("Exam Management"),
            vec![
                "Add New Exam",
                "Delete Exam",
                "View Exam Schedule",
                "Search Exam By Title/Code",
                "View Results For Exam",
            ]
        );
        assert_eq!(
            catalog().commands_for("Entry Management"),
            vec![
                "Create Entry",
                "Cancel Entry",
                "Update Grade",
                "View Entries",
                "View Cancelled Entries",
            ]
        );
    }

    #[test]
    fn test_unknown_lookups_return_not_found() {
        assert!(catalog().commands_for("Staff Management").is_empty());
        assert!(catalog().spec_for("Student Management", "Expel Student").is_none());
        assert!(catalog().spec_for("Staff Management", "Add Student").is_none());
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        assert!(catalog().commands_for("student management").is_empty());
        assert!(catalog().spec_for("Student Management", "delete student").is_none());
    }

    #[test]
    fn test_every_command_belongs_to_its_category() {
        for category in catalog().categories {
            for command in category.commands {
                assert_eq!(command.category, category.name, "{}", command.name);
            }
        }
    }

    #[test]
    fn test_placeholder_counts_match_fields() {
        for category in catalog().categories {
            for command in category.commands {
                match &command.statement {
                    Statement::Fixed { sql } => {
                        assert_eq!(
                            placeholder_count(sql),
                            command.fields.len(),
                            "{}",
                            command.name
                        );
                    }
                    Statement::Search { term, selector, variants } => {
                        assert!(command.field_index(term).is_some(), "{}", command.name);
                        let selector_idx = command.field_index(selector).expect("selector field");
                        let selector_field = &command.fields[selector_idx];
                        assert_eq!(selector_field.kind, FieldKind::Choice);
                        for variant in *variants {
                            assert_eq!(placeholder_count(variant.sql), 1, "{}", variant.sql);
                            assert!(selector_field.choices.contains(&variant.choice));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_choice_defaults_are_valid() {
        for category in catalog().categories {
            for command in category.commands {
                for field in command.fields.iter().filter(|f| f.kind == FieldKind::Choice) {
                    let default = field.default.expect("choice fields have a default");
                    assert!(field.choices.contains(&default), "{}.{}", command.name, field.id);
                }
            }
        }
    }

    #[test]
    fn test_row_commands_have_labels() {
        for category in catalog().categories {
            for command in category.commands {
                if command.expects_rows {
                    assert!(!command.result_columns.is_empty(), "{}", command.name);
                } else {
                    assert!(!command.success_notice.is_empty(), "{}", command.name);
                }
            }
        }
    }

    #[test]
    fn test_placeholder_count() {
        assert_eq!(placeholder_count("SELECT 1"), 0);
        assert_eq!(placeholder_count("SELECT $1"), 1);
        assert_eq!(placeholder_count("VALUES ($1, $2, $3)"), 3);
        assert_eq!(placeholder_count("WHERE a = $2 OR b = $1 OR c = $2"), 2);
        assert_eq!(placeholder_count("SELECT '$' || $10"), 10);
    }

    #[test]
    fn test_bind_fixed_statement() {
        let spec = catalog().spec_for("Student Management", "Delete Student").unwrap();
        let bound = spec.bind(&["12345678".to_string()]).unwrap();
        assert_eq!(bound.sql, "DELETE FROM student WHERE sno = $1");
        assert_eq!(bound.params, vec!["12345678".to_string()]);
    }

    #[test]
    fn test_bind_search_statement() {
        let spec =
            catalog().spec_for("Student Management", "Search Student By Email/ID/Name").unwrap();

        let bound = spec.bind(&["ann".to_string(), "Name".to_string()]).unwrap();
        assert!(bound.sql.contains("sname ILIKE $1"));
        assert_eq!(bound.params, vec!["%ann%".to_string()]);
        assert_eq!(bound.title, "Search Results (Name)");

        let bound = spec.bind(&["42".to_string(), "ID".to_string()]).unwrap();
        assert!(bound.sql.contains("sno = $1"));
        assert_eq!(bound.params, vec!["42".to_string()]);

        let bound = spec.bind(&["a@b.c".to_string(), "Email".to_string()]).unwrap();
        assert_eq!(bound.params, vec!["a@b.c".to_string()]);
    }

    #[test]
    fn test_bind_rejects_unknown_search_option() {
        let spec = catalog().spec_for("Exam Management", "Search Exam By Title/Code").unwrap();
        let err = spec.bind(&["db".to_string(), "Location".to_string()]).unwrap_err();
        assert!(matches!(err, ConsoleError::Validation(_)));
    }

    #[test]
    fn test_bind_rejects_wrong_value_count() {
        let spec = catalog().spec_for("Student Management", "Add Student").unwrap();
        let err = spec.bind(&["1".to_string()]).unwrap_err();
        assert!(err.message().contains("expects 3 values"));
    }

    #[test]
    fn test_catalog_serializes() {
        let json = serde_json::to_value(catalog()).unwrap();
        let first = &json["categories"][0]["commands"][0];
        assert_eq!(first["name"], "Add Student");
        assert_eq!(first["statement"]["type"], "fixed");
        assert_eq!(first["fields"][0]["kind"], "number");
    }
}
