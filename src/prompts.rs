//! Pure builders for the instruction text of the three generation stages.
//! Everything here is a plain function of its inputs; the wire payloads are
//! assembled in `llm::gemini`.

use crate::types::{Concept, GenerationSettings};

/// Fixed strategist role/ruleset for the analysis stage, including the style
/// template taxonomy the concepts draw their `style` labels from.
pub const STRATEGIST_SYSTEM_PROMPT: &str = "\
ROLE: You are the most advanced Design Strategist and Click Psychology Expert of the year 2026.
MISSION: Analyze video context, URLs, and specific user intent to generate 3 avant-garde thumbnail concepts.

2026 DESIGN RULES:
- Facial Expressions: NO forced open mouths. Use micro-expressions (raised eyebrow, intense gaze, subtle \"I know something you don't\" smile).
- Lighting: Global Illumination. Matches the author's face lighting to the scene source.
- Depth of Field: Cinematic f/1.8 blur for background separation.
- Colors: Avoid artificial neon. Use organic gradients, real textures, and lighting-based contrast.
- Typography: Max 3 words. No \"How to\". Use brutal statements or specific numbers.

TEMPLATES:
1. \"The Authority\" (Hormozi Style): Raw environment, Chiaroscuro lighting, handwriting/simple charts, maximum authenticity.
2. \"The Storyteller\" (Beast 2026 Style): Action frozen in time (Predictive Hook), vibrant but natural colors, author interacting with the focal point.
3. \"The Minimalist Paradox\" (Ultra-Modern): Single ultra-detailed central object, clean background, visual contradiction.
";

/// User-turn text for the analysis call. `intent` is optional; an empty or
/// absent intent contributes nothing to the request.
pub fn analysis_request(context: &str, intent: Option<&str>) -> String {
    let mut combined = format!("CONTEXT/URL: {context}");
    if let Some(intent) = intent {
        let intent = intent.trim();
        if !intent.is_empty() {
            combined.push_str(&format!("\nUSER SPECIFIC INTENT: {intent}"));
        }
    }

    format!(
        "Analyze this context and the specific user intent. Extract the Supreme Promise, \
         Unique Mechanism, and Target Audience. Then generate 3 thumbnail concepts that align \
         with the intent while following 2026 Viral Engine rules:\n{combined}"
    )
}

/// Instruction text accompanying the author photo on a synthesis call.
/// Restates orientation in words and fill-area terms, demands photorealistic
/// relighting into the concept's scene, renders the hook text as an in-scene
/// physical element, and forbids the classic clickbait artifacts.
pub fn synthesis_instruction(concept: &Concept, settings: &GenerationSettings) -> String {
    let orientation = settings.aspect_ratio.orientation_phrase();
    let area = settings.aspect_ratio.wire_value();

    format!(
        "THIS IS A {orientation} IMAGE.\n\
         [Author Photo Reference] is the person to be integrated.\n\
         Action: Seamlessly blend this author into the scene using 2026 Relighting AI principles.\n\
         Orientation: Strictly use a {orientation} composition. Crop or expand the background to fill the {area} area perfectly.\n\
         Skin tones and shadows on the face must match the environment perfectly.\n\
         Scene Description: {scene}\n\
         Style: Photorealistic, 8k resolution, shot on Sony A7R IV, 35mm lens, f/1.8 bokeh.\n\
         Text Integration: The text \"{hook}\" should be rendered as a physical 3D element in the scene.\n\
         NO clickbait red arrows, NO over-saturated faces, NO distorted expressions.",
        scene = concept.visual_prompt,
        hook = concept.hook_text,
    )
}

/// Instruction text for an edit call. The user's free text cannot override
/// the orientation constraint, so it is re-asserted here on every edit.
pub fn edit_instruction(instruction: &str, settings: &GenerationSettings) -> String {
    let orientation = settings.aspect_ratio.orientation_phrase();
    format!(
        "Edit this image according to this instruction: {instruction}. \
         IMPORTANT: Maintain the {orientation} orientation strictly. Do not change the aspect ratio. \
         Maintain the 2026 Viral Engine aesthetic."
    )
}
