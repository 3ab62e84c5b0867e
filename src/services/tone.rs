//! Friendly-tone augmentation: decorates a generated reply with emoji chosen
//! from keyword families found in the text.

use std::sync::LazyLock;

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;

/// Replies longer than this may get a second emoji near the middle.
const MIDPOINT_MIN_CHARS: usize = 100;

struct EmojiFamily {
    name: &'static str,
    pattern: Regex,
    emojis: &'static [&'static str],
}

fn family(name: &'static str, stems: &str, emojis: &'static [&'static str]) -> EmojiFamily {
    EmojiFamily {
        name,
        pattern: Regex::new(&format!(r"(?i)\b(?:{stems})")).unwrap(),
        emojis,
    }
}

static FAMILIES: LazyLock<Vec<EmojiFamily>> = LazyLock::new(|| {
    vec![
        family("happiness", r"happ(?:y|iness|ier)|joy\w*|glad|cheer\w*|delight\w*", &["😊", "😄", "🙂", "😁"]),
        family("sadness", r"sad\w*|unhapp\w*|down\b|depress\w*|lonel\w*|grie\w*|cry\w*|hurt\w*", &["😢", "💙", "🫂"]),
        family("anger", r"ang(?:er|ry)\w*|frustrat\w*|annoy\w*|furious|irritat\w*|mad\b", &["😤", "🌬️", "🧘"]),
        family("surprise", r"surpris\w*|amaz\w*|wow\b|unexpected\w*|astonish\w*", &["😮", "😲", "✨"]),
        family("confusion", r"confus\w*|unsure|uncertain\w*|puzzl\w*|don't know|not sure", &["🤔", "🧭"]),
        family("affection", r"love\w*|car(?:e|ing)\b|heart\w*|fond\w*|cherish\w*", &["❤️", "💕", "🤗"]),
        family("support", r"support\w*|help\w*|here for you|with you|listen\w*|together", &["🤝", "💪", "🫶"]),
        family("agreement", r"agree\w*|exactly|absolutely|of course|right\b|indeed", &["👍", "✅", "👌"]),
        family("celebration", r"congrat\w*|celebrat\w*|achiev\w*|proud|success\w*|accomplish\w*", &["🎉", "🥳", "🏆"]),
        family("reflection", r"reflect\w*|think\w*|consider\w*|wonder\w*|ponder\w*|journal\w*", &["💭", "🪞", "📝"]),
        family("wellness", r"health\w*|well-being|wellbeing|wellness|exercis\w*|sleep\w*|self-care|nutrition", &["🌿", "🍎", "🛌"]),
        family("relief", r"relie\w*|better\b|eas(?:e|ier|ing)\b|lighter|unburden\w*", &["😌", "🌤️"]),
        family("hope", r"hope\w*|optimis\w*|brighter|future|possib\w*|tomorrow", &["🌈", "🌅", "🌱"]),
        family("calm", r"calm\w*|relax\w*|breath\w*|peace\w*|mindful\w*|meditat\w*|tranquil\w*", &["🧘", "🌊", "🍃"]),
        family("empathy", r"understand\w*|feel\w*|valid\w*|empath\w*|sorry|difficult|hard\b", &["💜", "🤍", "🫂"]),
        family("encouragement", r"you can|keep going|believe in|strong\w*|brave\w*|courag\w*|step\w*", &["🌟", "💫", "🚀"]),
        family("gratitude", r"thank\w*|grate\w*|appreciat\w*|bless\w*", &["🙏", "💐"]),
    ]
});

static SENTENCE_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]\s+").unwrap());

/// Union of emoji candidates from every family whose keywords occur in `text`,
/// in family order without duplicates. Falls back to the support and
/// reflection families when nothing matches.
pub fn candidate_emojis(text: &str) -> Vec<&'static str> {
    let mut candidates: Vec<&'static str> = Vec::new();
    let mut push_family = |family: &EmojiFamily| {
        for emoji in family.emojis {
            if !candidates.contains(emoji) {
                candidates.push(emoji);
            }
        }
    };

    let mut matched = false;
    for family in FAMILIES.iter().filter(|f| f.pattern.is_match(text)) {
        tracing::trace!(family = family.name, "Tone family matched");
        push_family(family);
        matched = true;
    }

    if !matched {
        for family in FAMILIES
            .iter()
            .filter(|f| f.name == "support" || f.name == "reflection")
        {
            push_family(family);
        }
    }

    candidates
}

/// Insert `emoji` at the sentence boundary closest to the middle of `text`,
/// or append it when the text is a single sentence.
pub fn insert_at_midpoint(text: &str, emoji: &str) -> String {
    let midpoint = text.len() / 2;
    let boundary = SENTENCE_BOUNDARY
        .find_iter(text)
        .filter(|m| m.end() < text.len())
        .min_by_key(|m| (m.start() + 1).abs_diff(midpoint));

    match boundary {
        Some(m) => format!("{} {} {}", &text[..m.start() + 1], emoji, &text[m.end()..]),
        None => format!("{} {}", text.trim_end(), emoji),
    }
}

/// Decorate a reply: one random candidate emoji up front, and for long replies
/// a coin flip decides whether a second one goes near the middle.
pub fn augment<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    let candidates = candidate_emojis(text);
    let Some(first) = candidates.choose(rng) else {
        return text.to_string();
    };

    let body = if text.chars().count() > MIDPOINT_MIN_CHARS && rng.gen_bool(0.5) {
        match candidates.choose(rng) {
            Some(second) => insert_at_midpoint(text, second),
            None => text.to_string(),
        }
    } else {
        text.to_string()
    };

    format!("{} {}", first, body)
}
