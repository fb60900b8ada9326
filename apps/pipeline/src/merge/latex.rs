//! LaTeX skills block model.
//!
//! A block is a sequence of lines; category lines start with a
//! `\textbf{<Label>:}` header and carry a comma-separated skill list, and
//! are located by label, never by line number. Every other line (blank
//! lines, `\vspace{3pt}` spacers) passes through byte-identical.
//!
//! Skills are held unescaped in memory; LaTeX-significant characters are
//! escaped on serialization so the block stays compilable.

use crate::errors::PipelineError;
use crate::extract::types::SkillCategory;

const BOLD_PREFIX: &str = "\\textbf{";

/// Characters that must be backslash-escaped in LaTeX text.
const LATEX_SPECIALS: [char; 5] = ['&', '%', '_', '#', '$'];

#[derive(Debug, Clone)]
pub enum BlockLine {
    Category {
        category: SkillCategory,
        skills: Vec<String>,
        /// Leading whitespace of the source line, replayed on serialization.
        indent: String,
    },
    Passthrough(String),
}

#[derive(Debug, Clone, Default)]
pub struct ResumeSkillsBlock {
    pub lines: Vec<BlockLine>,
}

impl ResumeSkillsBlock {
    /// Parses a skills block. Lines whose bold header matches a known
    /// category label become category lines; everything else is preserved
    /// verbatim.
    pub fn parse(text: &str) -> Self {
        let lines = text
            .lines()
            .map(|line| parse_line(line).unwrap_or_else(|| BlockLine::Passthrough(line.to_string())))
            .collect();
        Self { lines }
    }

    pub fn serialize(&self) -> String {
        self.lines
            .iter()
            .map(|line| match line {
                BlockLine::Category {
                    category,
                    skills,
                    indent,
                } => {
                    let escaped: Vec<String> =
                        skills.iter().map(|s| escape_latex(s)).collect();
                    format!(
                        "{indent}\\textbf{{{}:}} {}",
                        escape_latex(category.label()),
                        escaped.join(", ")
                    )
                    .trim_end()
                    .to_string()
                }
                BlockLine::Passthrough(raw) => raw.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn skills(&self, category: SkillCategory) -> Option<&Vec<String>> {
        self.lines.iter().find_map(|line| match line {
            BlockLine::Category {
                category: c,
                skills,
                ..
            } if *c == category => Some(skills),
            _ => None,
        })
    }

    pub fn set_skills(&mut self, category: SkillCategory, new_skills: Vec<String>) {
        for line in &mut self.lines {
            if let BlockLine::Category {
                category: c,
                skills,
                ..
            } = line
            {
                if *c == category {
                    *skills = new_skills;
                    return;
                }
            }
        }
    }

    /// Categories present in the block, in file order.
    pub fn categories(&self) -> Vec<SkillCategory> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                BlockLine::Category { category, .. } => Some(*category),
                _ => None,
            })
            .collect()
    }
}

fn parse_line(line: &str) -> Option<BlockLine> {
    let stripped = line.trim_start();
    let indent = &line[..line.len() - stripped.len()];
    let rest = stripped.trim_end().strip_prefix(BOLD_PREFIX)?;
    let close = rest.find('}')?;
    let header = unescape_latex(rest[..close].trim_end_matches(':'));
    let category: SkillCategory = header.parse().ok()?;
    let skills = split_skills(&rest[close + 1..]);
    Some(BlockLine::Category {
        category,
        skills,
        indent: indent.to_string(),
    })
}

/// Splits a skill list on commas, ignoring commas inside parentheses
/// (e.g. "CI/CD (GitHub Actions, Jenkins)").
fn split_skills(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for ch in s.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                parts.push(current.clone());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    parts.push(current);
    parts
        .into_iter()
        .map(|p| unescape_latex(p.trim()))
        .filter(|p| !p.is_empty())
        .collect()
}

/// Backslash-escapes LaTeX-significant characters. Single backslash only;
/// already-escaped input should be unescaped first.
pub fn escape_latex(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if LATEX_SPECIALS.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Removes the backslash in front of escaped specials, yielding plain text.
pub fn unescape_latex(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() && LATEX_SPECIALS.contains(&chars[i + 1]) {
            out.push(chars[i + 1]);
            i += 2;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

/// Splices a rendered skills block into the full resume source.
///
/// Locates `\section{TECHNICAL SKILLS}`, then the `\item \small{` group
/// that holds the block, and replaces the brace-balanced group body.
/// Everything outside the group is untouched.
pub fn splice_into_resume(resume: &str, block: &str) -> Result<String, PipelineError> {
    let section_start = resume.find("\\section{TECHNICAL SKILLS}").ok_or_else(|| {
        PipelineError::ResumeStructure("TECHNICAL SKILLS section not found".to_string())
    })?;

    let item_pattern = "\\item \\small{";
    let item_rel = resume[section_start..].find(item_pattern).ok_or_else(|| {
        PipelineError::ResumeStructure("skills \\item \\small{ group not found".to_string())
    })?;
    // The '{' terminating the pattern opens the group.
    let brace_start = section_start + item_rel + item_pattern.len() - 1;

    let mut depth = 0usize;
    let mut brace_end = None;
    for (offset, ch) in resume[brace_start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    brace_end = Some(brace_start + offset);
                    break;
                }
            }
            _ => {}
        }
    }
    let brace_end = brace_end.ok_or_else(|| {
        PipelineError::ResumeStructure("unbalanced braces in skills group".to_string())
    })?;

    Ok(format!(
        "{}\n{}\n{}",
        &resume[..=brace_start],
        block,
        &resume[brace_end..]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: &str = "\\textbf{Programming Languages:} Python, C++\n\n\\vspace{3pt}\n\n\\textbf{Cloud \\& DevOps:} Docker, CI/CD (GitHub Actions, Jenkins)";

    #[test]
    fn test_parse_finds_categories_by_label() {
        let block = ResumeSkillsBlock::parse(BLOCK);
        assert_eq!(
            block.categories(),
            vec![
                SkillCategory::ProgrammingLanguages,
                SkillCategory::CloudDevOps
            ]
        );
        assert_eq!(
            block.skills(SkillCategory::ProgrammingLanguages).unwrap(),
            &vec!["Python".to_string(), "C++".to_string()]
        );
    }

    #[test]
    fn test_parenthesized_commas_not_split() {
        let block = ResumeSkillsBlock::parse(BLOCK);
        assert_eq!(
            block.skills(SkillCategory::CloudDevOps).unwrap(),
            &vec![
                "Docker".to_string(),
                "CI/CD (GitHub Actions, Jenkins)".to_string()
            ]
        );
    }

    #[test]
    fn test_passthrough_lines_preserved() {
        let block = ResumeSkillsBlock::parse(BLOCK);
        let out = block.serialize();
        assert!(out.contains("\\vspace{3pt}"));
        assert_eq!(out.lines().count(), BLOCK.lines().count());
    }

    #[test]
    fn test_serialize_escapes_ampersand_label() {
        let block = ResumeSkillsBlock::parse(BLOCK);
        assert!(block.serialize().contains("\\textbf{Cloud \\& DevOps:}"));
    }

    #[test]
    fn test_indented_category_line_keeps_indentation() {
        let block = ResumeSkillsBlock::parse("    \\textbf{Backend:} Node.js, gRPC");
        assert_eq!(block.serialize(), "    \\textbf{Backend:} Node.js, gRPC");

        let mut block = block;
        block.set_skills(SkillCategory::Backend, vec!["Rust".to_string()]);
        assert_eq!(block.serialize(), "    \\textbf{Backend:} Rust");
    }

    #[test]
    fn test_round_trip_is_stable() {
        let block = ResumeSkillsBlock::parse(BLOCK);
        let once = block.serialize();
        let twice = ResumeSkillsBlock::parse(&once).serialize();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_escape_latex_specials() {
        assert_eq!(escape_latex("C# & F_"), "C\\# \\& F\\_");
        assert_eq!(escape_latex("100% $5"), "100\\% \\$5");
    }

    #[test]
    fn test_unescape_inverts_escape() {
        let plain = "AT&T 100% C# _x $y";
        assert_eq!(unescape_latex(&escape_latex(plain)), plain);
    }

    #[test]
    fn test_unescape_leaves_commands_alone() {
        assert_eq!(unescape_latex("\\textbf{x}"), "\\textbf{x}");
    }

    #[test]
    fn test_set_skills_replaces_in_place() {
        let mut block = ResumeSkillsBlock::parse(BLOCK);
        block.set_skills(
            SkillCategory::ProgrammingLanguages,
            vec!["Rust".to_string()],
        );
        assert!(block
            .serialize()
            .contains("\\textbf{Programming Languages:} Rust"));
    }

    const RESUME: &str = "\\section{TECHNICAL SKILLS}\n\\begin{itemize}\n\\item \\small{\nOLD CONTENT {nested}\n}\n\\end{itemize}\ntrailing text";

    #[test]
    fn test_splice_replaces_group_body_only() {
        let out = splice_into_resume(RESUME, "NEW BLOCK").unwrap();
        assert!(out.contains("\\item \\small{\nNEW BLOCK\n}"));
        assert!(!out.contains("OLD CONTENT"));
        assert!(out.ends_with("\\end{itemize}\ntrailing text"));
    }

    #[test]
    fn test_splice_missing_section_errors() {
        let err = splice_into_resume("no section here", "x").unwrap_err();
        assert!(matches!(err, PipelineError::ResumeStructure(_)));
    }

    #[test]
    fn test_splice_missing_item_group_errors() {
        let err = splice_into_resume("\\section{TECHNICAL SKILLS}\nnothing else", "x").unwrap_err();
        assert!(matches!(err, PipelineError::ResumeStructure(_)));
    }
}
