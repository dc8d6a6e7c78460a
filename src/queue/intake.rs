//! Parser for the human-readable feature format.
//!
//! ```text
//! NAME: Contact import
//! CATEGORY: crm
//! DESCRIPTION: Import contacts from CSV
//! ---
//! free-form instructions for the worker,
//! kept verbatim
//! ```
//!
//! `NAME:` is required. `CATEGORY:` defaults to [`DEFAULT_CATEGORY`] and
//! `DESCRIPTION:` to the name. Several features can be given in one document,
//! separated by a line containing only `===`. A `===` line only separates
//! features when the next non-blank line is a header marker; otherwise it is
//! instruction text (a setext heading underline, say).

use crate::error::{QueueError, QueueResult};
use crate::models::{NewFeature, DEFAULT_CATEGORY};

const SEPARATOR: &str = "---";
const DOCUMENT_BREAK: &str = "===";
const MARKERS: [&str; 3] = ["NAME:", "CATEGORY:", "DESCRIPTION:"];

fn marker<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    line.strip_prefix(name).map(str::trim)
}

/// Drop leading and trailing blank lines, keep everything in between as is.
fn trim_blank_lines<'a, 'b>(lines: &'b [&'a str]) -> &'b [&'a str] {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(start), Some(end)) => &lines[start..=end],
        _ => &[],
    }
}

/// Parse a single feature definition.
pub fn parse_feature(text: &str) -> QueueResult<NewFeature> {
    let lines: Vec<&str> = text.lines().collect();
    let split = lines.iter().position(|l| l.trim() == SEPARATOR);
    let (header, body) = match split {
        Some(index) => (&lines[..index], &lines[index + 1..]),
        None => (&lines[..], &[][..]),
    };

    let mut name = None;
    let mut category = None;
    let mut description = None;
    for line in header.iter().map(|l| l.trim()) {
        if let Some(value) = marker(line, "NAME:") {
            name = Some(value);
        } else if let Some(value) = marker(line, "CATEGORY:") {
            category = Some(value);
        } else if let Some(value) = marker(line, "DESCRIPTION:") {
            description = Some(value);
        } else if !line.is_empty() {
            tracing::debug!("Ignoring unrecognised header line: {}", line);
        }
    }

    let name = match name {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => return Err(QueueError::validation("missing required NAME: line")),
    };
    let category = category
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CATEGORY)
        .to_string();
    let description = description
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| name.clone());

    let body = trim_blank_lines(body);
    let instructions = (!body.is_empty()).then(|| body.join("\n"));

    Ok(NewFeature {
        name,
        description,
        category,
        instructions,
    })
}

fn starts_header(rest: &[&str]) -> bool {
    rest.iter()
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
        .is_some_and(|l| MARKERS.iter().any(|m| l.starts_with(m)))
}

/// Parse every feature in a document. Fails as a whole if any block is invalid.
pub fn parse_features(text: &str) -> QueueResult<Vec<NewFeature>> {
    let lines: Vec<&str> = text.lines().collect();
    let mut blocks = vec![String::new()];
    for (index, line) in lines.iter().enumerate() {
        if line.trim() == DOCUMENT_BREAK && starts_header(&lines[index + 1..]) {
            blocks.push(String::new());
        } else if let Some(block) = blocks.last_mut() {
            block.push_str(line);
            block.push('\n');
        }
    }

    let features = blocks
        .iter()
        .filter(|block| !block.trim().is_empty())
        .enumerate()
        .map(|(index, block)| {
            parse_feature(block).map_err(|e| match e {
                QueueError::Validation(msg) => {
                    QueueError::Validation(format!("feature {}: {}", index + 1, msg))
                }
                other => other,
            })
        })
        .collect::<QueueResult<Vec<_>>>()?;

    if features.is_empty() {
        return Err(QueueError::validation("no features found"));
    }
    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_markers_and_instructions() {
        let parsed = parse_feature(
            "NAME: Foo\nCATEGORY: crm\nDESCRIPTION: does thing\n---\nstep 1\nstep 2",
        )
        .unwrap();

        assert_eq!(
            parsed,
            NewFeature {
                name: "Foo".to_string(),
                category: "crm".to_string(),
                description: "does thing".to_string(),
                instructions: Some("step 1\nstep 2".to_string()),
            }
        );
    }

    #[test]
    fn rejects_missing_name() {
        let err = parse_feature("CATEGORY: crm\n---\nstep 1").unwrap_err();
        assert!(matches!(err, QueueError::Validation(_)));

        let err = parse_feature("NAME:   \n---\n").unwrap_err();
        assert!(matches!(err, QueueError::Validation(_)));
    }

    #[test]
    fn defaults_category_and_description() {
        let parsed = parse_feature("NAME: Bar\n---\n").unwrap();
        assert_eq!(parsed.category, DEFAULT_CATEGORY);
        assert_eq!(parsed.description, "Bar");
        assert_eq!(parsed.instructions, None);
    }

    #[test]
    fn keeps_instruction_text_verbatim() {
        let parsed =
            parse_feature("NAME: Baz\n---\n\n  indented\n\nNAME: not a marker\n---\nend\n\n")
                .unwrap();
        assert_eq!(parsed.name, "Baz");
        assert_eq!(
            parsed.instructions.as_deref(),
            Some("  indented\n\nNAME: not a marker\n---\nend")
        );
    }

    #[test]
    fn header_without_separator_has_no_instructions() {
        let parsed = parse_feature("NAME: Qux\r\nDESCRIPTION: d\r\n").unwrap();
        assert_eq!(parsed.description, "d");
        assert_eq!(parsed.instructions, None);
    }

    #[test]
    fn parses_multiple_documents() {
        let features =
            parse_features("NAME: One\n---\na\n===\nNAME: Two\nCATEGORY: ops\n---\nb\n").unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].name, "One");
        assert_eq!(features[1].category, "ops");
        assert_eq!(features[1].instructions.as_deref(), Some("b"));
    }

    #[test]
    fn underline_in_instructions_is_not_a_document_break() {
        let text = "NAME: Foo\n---\nOverview\n===\nstep 1\n";
        let features = parse_features(text).unwrap();
        assert_eq!(features, vec![parse_feature(text).unwrap()]);
        assert_eq!(
            features[0].instructions.as_deref(),
            Some("Overview\n===\nstep 1")
        );

        let features =
            parse_features("NAME: One\n---\nTitle\n===\n\nbody\n===\n\nNAME: Two\n").unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].instructions.as_deref(), Some("Title\n===\n\nbody"));
        assert_eq!(features[1].name, "Two");
    }

    #[test]
    fn one_invalid_document_rejects_the_batch() {
        let err = parse_features("NAME: One\n===\nDESCRIPTION: no name\n").unwrap_err();
        match err {
            QueueError::Validation(msg) => assert!(msg.contains("feature 2")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_document_is_rejected() {
        assert!(matches!(
            parse_features("\n\n"),
            Err(QueueError::Validation(_))
        ));
    }
}
