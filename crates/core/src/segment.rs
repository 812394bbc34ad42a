use crate::error::ExtractError;
use crate::filter::{MeaningfulnessStrategy, SyntacticFilter, WordCountFilter};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub const TERMINAL_PUNCTUATION: [char; 3] = ['.', '!', '?'];

const SENTENCE_BOUNDARY_PATTERN: &str = r"[.!?]\s+";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosTag {
    Noun,
    Verb,
    Other,
}

#[derive(Debug, Clone)]
pub struct TaggedToken {
    pub text: String,
    pub tag: PosTag,
}

/// Syntactic text-analysis model: sentence boundaries plus coarse
/// part-of-speech tags. Injected so tests can substitute their own model.
pub trait SyntaxModel: Send + Sync {
    fn sentences(&self, text: &str) -> Vec<String>;
    fn tokens(&self, text: &str) -> Vec<TaggedToken>;
}

/// Wordlist-backed model. Loaded once at startup from `nouns.txt` and
/// `verbs.txt` in the lexicon directory; absence of either file means the
/// process runs the rule-based strategies instead.
pub struct LexiconModel {
    nouns: HashSet<String>,
    verbs: HashSet<String>,
}

impl LexiconModel {
    pub fn load(dir: &Path) -> std::io::Result<Self> {
        Ok(Self {
            nouns: read_wordlist(&dir.join("nouns.txt"))?,
            verbs: read_wordlist(&dir.join("verbs.txt"))?,
        })
    }
}

fn read_wordlist(path: &Path) -> std::io::Result<HashSet<String>> {
    let contents = fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(|line| line.trim().to_lowercase())
        .filter(|line| !line.is_empty())
        .collect())
}

impl SyntaxModel for LexiconModel {
    fn sentences(&self, text: &str) -> Vec<String> {
        scan_sentences(text)
    }

    fn tokens(&self, text: &str) -> Vec<TaggedToken> {
        text.split_whitespace()
            .map(|raw| {
                let word = raw
                    .trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase();
                let tag = if self.verbs.contains(&word) {
                    PosTag::Verb
                } else if self.nouns.contains(&word) {
                    PosTag::Noun
                } else {
                    PosTag::Other
                };
                TaggedToken {
                    text: raw.to_string(),
                    tag,
                }
            })
            .collect()
    }
}

/// Cuts after a terminal punctuation mark followed by whitespace, keeping the
/// mark attached to the preceding sentence.
fn scan_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut after_terminal = false;

    for (index, ch) in text.char_indices() {
        if after_terminal && ch.is_whitespace() {
            let sentence = text[start..index].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            start = index;
        }
        after_terminal = TERMINAL_PUNCTUATION.contains(&ch);
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

pub trait SegmentationStrategy: Send + Sync {
    fn to_paragraphs(&self, text: &str) -> Vec<String>;
    fn to_sentences(&self, text: &str) -> Vec<String>;
}

pub struct SyntacticSegmenter {
    model: Arc<dyn SyntaxModel>,
}

impl SyntacticSegmenter {
    pub fn new(model: Arc<dyn SyntaxModel>) -> Self {
        Self { model }
    }
}

impl SegmentationStrategy for SyntacticSegmenter {
    /// Greedily accumulates model sentences, flushing the buffer as one
    /// paragraph whenever a sentence ends in terminal punctuation. A trailing
    /// unflushed buffer becomes the final paragraph.
    fn to_paragraphs(&self, text: &str) -> Vec<String> {
        let mut paragraphs = Vec::new();
        let mut buffer = String::new();

        for sentence in self.model.sentences(text) {
            let sentence = sentence.trim();
            if sentence.is_empty() {
                continue;
            }
            if !buffer.is_empty() {
                buffer.push(' ');
            }
            buffer.push_str(sentence);
            if sentence.ends_with(TERMINAL_PUNCTUATION) {
                paragraphs.push(std::mem::take(&mut buffer));
            }
        }

        if !buffer.is_empty() {
            paragraphs.push(buffer);
        }

        paragraphs
    }

    fn to_sentences(&self, text: &str) -> Vec<String> {
        self.model
            .sentences(text)
            .iter()
            .map(|sentence| sentence.trim().to_string())
            .filter(|sentence| !sentence.is_empty())
            .collect()
    }
}

pub struct RuleSegmenter {
    boundary: Regex,
}

impl RuleSegmenter {
    pub fn new() -> Result<Self, ExtractError> {
        Ok(Self {
            boundary: Regex::new(SENTENCE_BOUNDARY_PATTERN)?,
        })
    }
}

impl SegmentationStrategy for RuleSegmenter {
    fn to_paragraphs(&self, text: &str) -> Vec<String> {
        text.split("\n\n")
            .map(str::trim)
            .filter(|paragraph| !paragraph.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn to_sentences(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut start = 0;

        for found in self.boundary.find_iter(text) {
            // The terminal mark is a single byte; keep it with the sentence.
            let cut = found.start() + 1;
            let sentence = text[start..cut].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            start = found.end();
        }

        let tail = text[start..].trim();
        if !tail.is_empty() {
            sentences.push(tail.to_string());
        }

        sentences
    }
}

/// The segmentation and meaningfulness strategies selected for the process.
/// Selection happens once; nothing toggles per request.
#[derive(Clone)]
pub struct Strategies {
    pub segmenter: Arc<dyn SegmentationStrategy>,
    pub filter: Arc<dyn MeaningfulnessStrategy>,
    pub syntactic: bool,
}

pub fn select_strategies(lexicon_dir: Option<&Path>) -> Result<Strategies, ExtractError> {
    if let Some(dir) = lexicon_dir {
        if let Ok(model) = LexiconModel::load(dir) {
            let model: Arc<dyn SyntaxModel> = Arc::new(model);
            return Ok(Strategies {
                segmenter: Arc::new(SyntacticSegmenter::new(model.clone())),
                filter: Arc::new(SyntacticFilter::new(model)),
                syntactic: true,
            });
        }
    }

    Ok(Strategies {
        segmenter: Arc::new(RuleSegmenter::new()?),
        filter: Arc::new(WordCountFilter),
        syntactic: false,
    })
}
