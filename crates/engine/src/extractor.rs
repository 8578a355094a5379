use crate::lines::DocumentLines;
use crate::{EngineError, Result};
use reconcile_protocol::{Identifier, Placeholder, Span};
use regex::Regex;
use std::path::Path;

/// Finds `DIRECTIVE("<path>", <identifier>);` lines in source text.
///
/// The directive has to open the line (leading whitespace allowed), which
/// keeps commented-out directives out of the data model. Lines with another
/// argument shape, or whose second argument is not an identifier, are
/// skipped: directive variants evolve faster than this parser does.
#[derive(Debug, Clone)]
pub struct PlaceholderExtractor {
    pattern: Regex,
}

impl PlaceholderExtractor {
    pub fn new(directive: &str) -> Result<Self> {
        let source = format!(
            r#"^\s*{}\s*\(\s*"([^"]*)"\s*,\s*([A-Za-z0-9_]+)\s*\)\s*;"#,
            regex::escape(directive)
        );
        let pattern = Regex::new(&source)
            .map_err(|err| EngineError::invalid_config(format!("directive pattern: {err}")))?;
        Ok(Self { pattern })
    }

    /// Extract every placeholder in `text`. Never mutates anything.
    pub fn extract(&self, document: &Path, text: &str) -> Vec<Placeholder> {
        let lines = DocumentLines::parse(text);
        let mut placeholders = Vec::new();

        for (line, raw) in lines.iter() {
            let Some(caps) = self.pattern.captures(raw) else {
                continue;
            };
            let (Some(path), Some(argument)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let Some(identifier) = Identifier::parse(argument.as_str()) else {
                log::debug!(
                    "{}:{line}: skipping directive with non-identifier argument {}",
                    document.display(),
                    argument.as_str()
                );
                continue;
            };

            placeholders.push(Placeholder {
                document: document.to_path_buf(),
                line,
                path: path.as_str().to_string(),
                identifier,
                raw: raw.to_string(),
                path_span: Span::new(path.start(), path.end()),
                identifier_span: Span::new(argument.start(), argument.end()),
            });
        }

        placeholders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CD_C: &str = r#"#include "common.h"

INCLUDE_ASM("config/../asm/rock_neo/nonmatchings/cd", func_8001BB4C);

INCLUDE_ASM("config/../asm/rock_neo/nonmatchings/cd", Cd_read_comb);
// INCLUDE_ASM("asm/rock_neo/nonmatchings/player", func_8003BE40); // MISSING: func_8003BE40.s
    INCLUDE_ASM( "asm/rock_neo/nonmatchings/cd" , D_8002ABE4 ) ;
INCLUDE_ASM("asm/rock_neo/nonmatchings/cd", func_8001BB50, extra);
"#;

    #[test]
    fn extracts_directives_with_line_numbers() {
        let extractor = PlaceholderExtractor::new("INCLUDE_ASM").unwrap();
        let found = extractor.extract(Path::new("src/cd.c"), CD_C);

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].line, 3);
        assert_eq!(found[0].path, "config/../asm/rock_neo/nonmatchings/cd");
        assert_eq!(found[0].identifier.as_str(), "func_8001BB4C");
        assert_eq!(
            &found[0].raw[found[0].identifier_span.start..found[0].identifier_span.end],
            "func_8001BB4C"
        );

        assert_eq!(found[1].line, 7);
        assert_eq!(found[1].identifier.as_str(), "D_8002ABE4");
        assert_eq!(
            &found[1].raw[found[1].path_span.start..found[1].path_span.end],
            "asm/rock_neo/nonmatchings/cd"
        );
    }

    #[test]
    fn crlf_terminators_are_not_part_of_raw_text() {
        let extractor = PlaceholderExtractor::new("INCLUDE_ASM").unwrap();
        let text = "x\r\nINCLUDE_ASM(\"asm/cd\", func_80010000);\r\n";
        let found = extractor.extract(Path::new("a.c"), text);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].line, 2);
        assert_eq!(found[0].raw, "INCLUDE_ASM(\"asm/cd\", func_80010000);");
    }

    #[test]
    fn directive_name_is_configurable() {
        let extractor = PlaceholderExtractor::new("INCLUDE_RODATA").unwrap();
        let found = extractor.extract(
            Path::new("a.c"),
            "INCLUDE_ASM(\"asm/cd\", func_80010000);\nINCLUDE_RODATA(\"asm/cd\", D_80010000);\n",
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].identifier.as_str(), "D_80010000");
    }
}
