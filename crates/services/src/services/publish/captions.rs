//! Timed captions from narration text.
//!
//! Each sentence gets a share of the master's duration proportional to its
//! character length, clamped to the configured band, laid end to end and
//! clipped at the end of the video.

use artifacts::models::publish::{CaptionSegment, CaptionSource, Captions};

use crate::services::config::PublishConfig;

pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        let boundary = matches!(c, '.' | '!' | '?')
            && chars.peek().is_none_or(|next| next.is_whitespace());
        if boundary {
            let sentence = current.split_whitespace().collect::<Vec<_>>().join(" ");
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            current.clear();
        }
    }
    let rest = current.split_whitespace().collect::<Vec<_>>().join(" ");
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

pub fn allocate(sentences: &[String], duration: f64, min: f64, max: f64) -> Vec<CaptionSegment> {
    let total_chars: usize = sentences.iter().map(|s| s.chars().count()).sum();
    if total_chars == 0 || duration <= 0.0 {
        return Vec::new();
    }

    let mut segments = Vec::new();
    let mut cursor = 0.0f64;
    for sentence in sentences {
        if cursor >= duration {
            break;
        }
        let share = duration * sentence.chars().count() as f64 / total_chars as f64;
        let end = (cursor + share.clamp(min, max)).min(duration);
        segments.push(CaptionSegment {
            index: segments.len(),
            start_time: round_ms(cursor),
            end_time: round_ms(end),
            text: sentence.clone(),
        });
        cursor = end;
    }
    segments.retain(|s| s.end_time > s.start_time);
    for (index, segment) in segments.iter_mut().enumerate() {
        segment.index = index;
    }
    segments
}

fn round_ms(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

/// Narration captions when there is narration, otherwise the fixed set.
pub fn build_captions(narration: Option<&str>, duration: f64, config: &PublishConfig) -> Captions {
    let sentences = narration.map(split_sentences).unwrap_or_default();
    if !sentences.is_empty() {
        let segments = allocate(
            &sentences,
            duration,
            config.caption_min_seconds,
            config.caption_max_seconds,
        );
        if !segments.is_empty() {
            return Captions {
                source: CaptionSource::Narration,
                segments,
            };
        }
    }
    Captions {
        source: CaptionSource::Fallback,
        segments: allocate(
            &config.fallback_captions,
            duration,
            config.caption_min_seconds,
            config.caption_max_seconds,
        ),
    }
}
