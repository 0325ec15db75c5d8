use std::fmt::Write;
use std::time::Duration;

use crate::coordinator::AggregationResult;

/// BCP-47 codes seen in the corpus, sorted by code.
const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("am", "Amharic"),
    ("ar", "Arabic"),
    ("bg", "Bulgarian"),
    ("bn", "Bengali"),
    ("bo", "Tibetan"),
    ("ckb", "Sorani Kurdish"),
    ("cs", "Czech"),
    ("cy", "Welsh"),
    ("da", "Danish"),
    ("de", "German"),
    ("dv", "Maldivian"),
    ("el", "Greek"),
    ("en", "English"),
    ("es", "Spanish"),
    ("et", "Estonian"),
    ("fa", "Persian"),
    ("fi", "Finnish"),
    ("fr", "French"),
    ("gu", "Gujarati"),
    ("hi", "Hindi"),
    ("ht", "Haitian"),
    ("hu", "Hungarian"),
    ("hy", "Armenian"),
    ("in", "Indonesian"),
    ("is", "Icelandic"),
    ("it", "Italian"),
    ("iw", "Hebrew"),
    ("ja", "Japanese"),
    ("ka", "Georgian"),
    ("km", "Khmer"),
    ("kn", "Kannada"),
    ("ko", "Korean"),
    ("lo", "Lao"),
    ("lt", "Lithuanian"),
    ("lv", "Latvian"),
    ("ml", "Malayalam"),
    ("mr", "Marathi"),
    ("my", "Burmese"),
    ("ne", "Nepali"),
    ("nl", "Dutch"),
    ("no", "Norwegian"),
    ("or", "Oriya"),
    ("pa", "Panjabi"),
    ("pl", "Polish"),
    ("ps", "Pashto"),
    ("pt", "Portuguese"),
    ("ro", "Romanian"),
    ("ru", "Russian"),
    ("sd", "Sindhi"),
    ("si", "Sinhala"),
    ("sk", "Slovak"),
    ("sl", "Slovenian"),
    ("sr", "Serbian"),
    ("sv", "Swedish"),
    ("ta", "Tamil"),
    ("te", "Telugu"),
    ("th", "Thai"),
    ("tl", "Tagalog"),
    ("tr", "Turkish"),
    ("ug", "Uyghur"),
    ("uk", "Ukrainian"),
    ("und", "Undefined"),
    ("ur", "Urdu"),
    ("vi", "Vietnamese"),
    ("zh", "Chinese"),
];

pub fn language_name(code: &str) -> Option<&'static str> {
    LANGUAGE_NAMES
        .binary_search_by(|(c, _)| (*c).cmp(code))
        .ok()
        .map(|i| LANGUAGE_NAMES[i].1)
}

#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    pub language_names: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptions {
            language_names: true,
        }
    }
}

pub fn render(result: &AggregationResult, options: ReportOptions) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "----- Top {} Hashtags -----", result.limit);
    for (i, (tag, count)) in result.top_hashtags.iter().enumerate() {
        let _ = writeln!(out, "{}. #{}, {}", i + 1, tag, count);
    }

    let _ = writeln!(out, "----- Top {} Languages -----", result.limit);
    for (i, (code, count)) in result.top_languages.iter().enumerate() {
        let name = options.language_names.then(|| language_name(code)).flatten();
        match name {
            Some(name) => {
                let _ = writeln!(out, "{}. {} ({}), {}", i + 1, name, code, count);
            }
            None => {
                let _ = writeln!(out, "{}. ({}), {}", i + 1, code, count);
            }
        }
    }
    out
}

pub fn format_elapsed(elapsed: Duration) -> String {
    format!("Total Time for task is {:.4} seconds.", elapsed.as_secs_f64())
}
