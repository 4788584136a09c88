//! Prompt text sent to the hosted models.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::options::{VectorizationMode, VectorizationOptions};

pub const VECTORIZE_NEGATIVE_PROMPT: &str =
    "blurry, low quality, distorted, pixelated, grainy, watermark";
pub const MODIFY_NEGATIVE_PROMPT: &str =
    "blurry, low quality, distorted, pixelated, grainy, watermark, photorealistic, messy";

pub const SYSTEM_PROMPT: &str = "You are an expert graphic design consultant specializing in vectorization, rubber stamp production, typography, and CorelDRAW. You have extensive knowledge in:

1. Vectorization techniques and best practices
2. Creating designs suitable for rubber stamp production
3. Typography, font recognition, and text design
4. CorelDRAW optimization and workflow
5. Color theory for print media
6. Positive/negative inversion for stamps
7. File formats (SVG, PDF, EPS, DXF, AI)

Provide professional, practical, and clear advice. When users ask about stamps, always consider:
- Line weight and visibility
- Negative space requirements
- Print compatibility
- Material considerations
- Scalability for different stamp sizes

Be encouraging and helpful to both beginners and professionals.";

const CHAT_CLOSING: &str = "Provide a helpful, expert response:";

pub const CHAT_FALLBACK_REPLY: &str = "I'm here to help with your vectorization and design needs! Could you please provide more details about what you'd like to know?";

pub const FONT_ANALYSIS_PROMPT: &str = "Analyze the typography and font in this image. Provide a detailed analysis including:

1. Font Family/Category (serif, sans-serif, script, display, monospace, etc.)
2. Font Weight (light, regular, bold, black, etc.)
3. Font Style (normal, italic, oblique)
4. Key Characteristics:
   - Letter spacing/kerning
   - X-height
   - Stroke contrast
   - Unique letter features (e.g., terminal style, counter shapes)
   - Overall personality (modern, classic, playful, elegant, etc.)
5. Similar fonts (both commercial and free alternatives)
6. Best use cases for this font
7. Tips for vectorizing this text for CorelDRAW and rubber stamp production

Be as specific and detailed as possible. If you recognize the exact font, name it. Otherwise, describe it thoroughly so the user can find similar fonts.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Style prompt for the image model, derived from the selected options
pub fn vectorize_prompt(options: &VectorizationOptions) -> String {
    let mut prompt = String::from("professional vector illustration, clean lines, scalable graphic design");

    prompt.push_str(match options.mode {
        VectorizationMode::Artistic => ", artistic style, creative details, textured elements",
        VectorizationMode::Logo => ", logo design, clean lines, minimalist, brand identity",
        VectorizationMode::Photo => ", photorealistic vector style, detailed shading",
        VectorizationMode::Sketch => ", sketch style, line art, hand-drawn look",
        VectorizationMode::Standard => ", balanced vector style",
    });

    if options.detail_level > 70 {
        prompt.push_str(", high detail, intricate");
    } else if options.detail_level < 30 {
        prompt.push_str(", simple, minimal");
    }

    if options.smoothness > 70 {
        prompt.push_str(", smooth gradients, soft edges");
    } else if options.smoothness < 30 {
        prompt.push_str(", sharp edges, crisp lines");
    }

    if options.color_count <= 2 {
        prompt.push_str(", monochrome, black and white");
    } else if options.color_count <= 4 {
        prompt.push_str(", limited color palette");
    } else if options.preserve_colors {
        prompt.push_str(", preserve original colors");
    } else {
        prompt.push_str(", vibrant colors");
    }

    if options.remove_background {
        prompt.push_str(", transparent background");
    }
    if options.optimize_for_print {
        prompt.push_str(", high contrast, print-ready, suitable for rubber stamp");
    }
    if options.is_negative() {
        prompt.push_str(", inverted colors, negative image");
    }

    prompt
}

/// Wrap a free-form edit request with vector-friendly guidance
pub fn modify_prompt(user_prompt: &str, options: &VectorizationOptions) -> String {
    let mut prompt = format!("Professional vector illustration style: {}. ", user_prompt.trim());
    prompt.push_str("Clean lines, scalable, suitable for graphic design. ");
    prompt.push_str("Maintain vector-friendly characteristics. ");

    if options.optimize_for_print {
        prompt.push_str("Optimized for print and rubber stamp production with high contrast. ");
    }
    if options.is_negative() {
        prompt.push_str("Keep negative/inverted color scheme. ");
    }
    if options.preserve_colors {
        prompt.push_str("Preserve original color scheme. ");
    }

    prompt
}

/// Flatten the system prompt, prior turns and the new message into one completion prompt
pub fn chat_conversation(message: &str, history: &[ChatMessage]) -> String {
    let mut conversation = format!("{}\n\n", SYSTEM_PROMPT);

    if !history.is_empty() {
        conversation.push_str("Previous conversation:\n");
        for msg in history {
            conversation.push_str(msg.role.as_str());
            conversation.push_str(": ");
            conversation.push_str(&msg.content);
            conversation.push('\n');
        }
        conversation.push('\n');
    }

    conversation.push_str(&format!("User: {}\n", message));
    conversation.push('\n');
    conversation.push_str(CHAT_CLOSING);
    conversation
}

fn echo_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(?s)System:.*?User:").expect("static regex"),
            Regex::new(r"(?s)Previous conversation:.*?User:").expect("static regex"),
        ]
    })
}

/// Strip prompt scaffolding the model sometimes echoes back
pub fn clean_chat_response(raw: &str) -> String {
    let mut cleaned = raw.to_string();
    for pattern in echo_patterns() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }
    let cleaned = cleaned.replace(CHAT_CLOSING, "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() < 10 {
        CHAT_FALLBACK_REPLY.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Advice returned in place of an analysis when the provider call fails
pub fn font_fallback_analysis(error: &str) -> String {
    format!(
        "I couldn't complete the font analysis due to a technical issue: {error}.

However, I can provide some general tips for font recognition:
1. Use tools like WhatTheFont or Fontspring Matcherator
2. Look for distinctive letter features (like the 'a', 'g', or 'R')
3. Note if it's serif (has decorative strokes) or sans-serif (clean lines)
4. Check the weight (light, regular, bold)
5. Consider the overall personality (modern, classic, playful)

For rubber stamp production, ensure the font has:
- Clear, legible letters
- Adequate spacing between characters
- Bold enough strokes for good impression
- Avoid very thin or delicate fonts"
    )
}
