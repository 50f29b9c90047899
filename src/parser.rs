//! Pipeline construction: splitting a command line into stages and
//! extracting the file redirections at its ends.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use crate::lexer;

/// One stage of a pipeline.
///
/// `text` is the stage's argument text with any recognized redirection
/// suffix stripped, otherwise left as written. Tokenization happens when the
/// stage is launched, via [`CommandSegment::words`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSegment {
    pub text: String,
    /// Input file; recognized only on the first stage.
    pub input: Option<PathBuf>,
    /// Output file; recognized only on the last stage.
    pub output: Option<PathBuf>,
}

impl CommandSegment {
    /// The stage's argument words; the first is the program name.
    pub fn words(&self) -> Vec<String> {
        lexer::split_words(&self.text)
    }
}

/// An ordered, non-empty sequence of stages built from one submitted line.
/// Stage i reads from pipe i-1 and writes to pipe i, except at the ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub segments: Vec<CommandSegment>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    /// A stage had no words left after redirection stripping, e.g. `a | | b`.
    EmptyCommand,
    /// A redirection marker with nothing after it, e.g. `sort <`.
    MissingRedirectTarget(char),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::EmptyCommand => write!(f, "empty command in pipeline"),
            ParseError::MissingRedirectTarget(marker) => {
                write!(f, "missing file name after '{marker}'")
            }
        }
    }
}

impl Error for ParseError {}

/// Split `line` on `|` into stages, then extract the last stage's `>` target
/// and the first stage's `<` target.
///
/// Only the first occurrence of each marker is recognized, and only on its
/// applicable stage; middle stages are never scanned. Output extraction runs
/// before input extraction so the single-stage form `cmd < in > out`
/// resolves both paths.
pub fn build_pipeline(line: &str) -> Result<Pipeline, ParseError> {
    let mut texts: Vec<String> = line.split('|').map(str::to_owned).collect();

    let last = texts.len() - 1;
    let output = extract_redirect(&mut texts[last], '>')?;
    let input = extract_redirect(&mut texts[0], '<')?;

    let segments = texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let segment = CommandSegment {
                text,
                input: if i == 0 { input.clone() } else { None },
                output: if i == last { output.clone() } else { None },
            };
            if segment.words().is_empty() {
                return Err(ParseError::EmptyCommand);
            }
            Ok(segment)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Pipeline { segments })
}

/// Recognize the first `marker` in `text`. The trimmed remainder after it
/// becomes the file path; the marker and everything after it are stripped.
fn extract_redirect(text: &mut String, marker: char) -> Result<Option<PathBuf>, ParseError> {
    let Some(pos) = text.find(marker) else {
        return Ok(None);
    };
    let target = text[pos + 1..].trim();
    if target.is_empty() {
        return Err(ParseError::MissingRedirectTarget(marker));
    }
    let target = PathBuf::from(target);
    text.truncate(pos);
    Ok(Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_pipes() {
        let pipeline = build_pipeline("a | b | c").unwrap();
        assert_eq!(pipeline.segments.len(), 3);
        assert_eq!(pipeline.segments[0].words(), vec!["a"]);
        assert_eq!(pipeline.segments[1].words(), vec!["b"]);
        assert_eq!(pipeline.segments[2].words(), vec!["c"]);
    }

    #[test]
    fn line_without_pipes_is_one_stage() {
        let pipeline = build_pipeline("ls -l").unwrap();
        assert_eq!(pipeline.segments.len(), 1);
        assert_eq!(pipeline.segments[0].text, "ls -l");
    }

    #[test]
    fn input_redirect_extracted_from_first_stage() {
        let pipeline = build_pipeline("sort < in.txt").unwrap();
        let stage = &pipeline.segments[0];
        assert_eq!(stage.text, "sort ");
        assert_eq!(stage.input, Some(PathBuf::from("in.txt")));
        assert_eq!(stage.output, None);
    }

    #[test]
    fn output_redirect_extracted_from_last_stage() {
        let pipeline = build_pipeline("grep x > out.txt").unwrap();
        let stage = &pipeline.segments[0];
        assert_eq!(stage.text, "grep x ");
        assert_eq!(stage.output, Some(PathBuf::from("out.txt")));
    }

    #[test]
    fn single_stage_can_redirect_both_ends() {
        let pipeline = build_pipeline("cat < in > out").unwrap();
        let stage = &pipeline.segments[0];
        assert_eq!(stage.words(), vec!["cat"]);
        assert_eq!(stage.input, Some(PathBuf::from("in")));
        assert_eq!(stage.output, Some(PathBuf::from("out")));
    }

    #[test]
    fn redirects_attach_to_the_applicable_ends() {
        let pipeline = build_pipeline("a < in | b | c > out").unwrap();
        assert_eq!(pipeline.segments[0].input, Some(PathBuf::from("in")));
        assert_eq!(pipeline.segments[1].input, None);
        assert_eq!(pipeline.segments[1].output, None);
        assert_eq!(pipeline.segments[2].output, Some(PathBuf::from("out")));
    }

    #[test]
    fn marker_on_a_middle_stage_stays_a_word() {
        // `>` is only recognized on the last stage; elsewhere it tokenizes
        // like any other word.
        let pipeline = build_pipeline("a > x | b").unwrap();
        assert_eq!(pipeline.segments[0].words(), vec!["a", ">", "x"]);
        assert_eq!(pipeline.segments[0].output, None);
    }

    #[test]
    fn missing_redirect_target_is_an_error() {
        assert_eq!(
            build_pipeline("sort <"),
            Err(ParseError::MissingRedirectTarget('<'))
        );
        assert_eq!(
            build_pipeline("ls >"),
            Err(ParseError::MissingRedirectTarget('>'))
        );
    }

    #[test]
    fn empty_stage_is_an_error() {
        assert_eq!(build_pipeline("a | | b"), Err(ParseError::EmptyCommand));
        assert_eq!(build_pipeline("| a"), Err(ParseError::EmptyCommand));
    }
}
