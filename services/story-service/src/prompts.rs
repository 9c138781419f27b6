use serde_json::json;

use crate::models::StartStoryRequest;

/// Sections every scene image prompt must open with. The image provider needs
/// the character sheet and style preset to keep characters visually consistent
/// across scenes, so prompts missing them are rejected before any network call.
pub const CHARACTER_SHEET_MARKER: &str = "[CHARACTER SHEET]";
pub const STYLE_PRESET_MARKER: &str = "[STYLE PRESET]";
pub const SCENE_PROMPT_MARKER: &str = "[SCENE PROMPT]";

pub fn has_header_template(image_prompt: &str) -> bool {
    image_prompt.contains(CHARACTER_SHEET_MARKER)
        && image_prompt.contains(STYLE_PRESET_MARKER)
        && image_prompt.contains(SCENE_PROMPT_MARKER)
}

/// Header template the story generator is instructed to emit verbatim at the
/// start of every scene's image prompt.
pub const IMAGE_PROMPT_HEADER_TEMPLATE: &str = r#"
[CHARACTER SHEET]
{{for each character in sceneCharacters}}
id: {{id}}
name: {{name}}
token: {{token}}            // stable unique identifier (e.g. "charTok:JAX-27")
hair: {{color/style/length}}
eyes: {{color/shape}}
skin: {{tone}}
outfit: {{top/bottom/accessories}}
palette: {{#RRGGBB, #RRGGBB, #RRGGBB}}   // 3-6 key colors
silhouette: {{keywords}}                 // shape/volume traits
style: {{cel-shaded | painterly | flat-color | watercolor}}
proportions: {{cartoon | semi-realistic | realistic}}
do-not-change: hair color; eye color; outfit core; proportions
{{end}}

[STYLE PRESET]
global_style: {{global_preset}}          // e.g. "flat-color, clean lines"
camera: 35mm, medium shot, eye-level
lighting: soft, even
aspect: 4:3

[NEGATIVE RULES]
no new accessories; no hairstyle changes; no color drift; no extra characters; no text overlay

[SCENE PROMPT]
{{short description of the action, emotions, setting}}
"#;

pub fn build_story_prompt(params: &StartStoryRequest, language: &str) -> String {
    format!(
        r#"Act as an author of interactive children's stories. You must generate a complete branching story.

Base data:
- Title: {title}
- Main character: {character} (id: 'main_character')
- Main environment: {environment} (id: 'main_environment')
- Theme: {theme}
- Objective: {objective}

Requirements:
- Write the entire story in {language}.
- Use every character listed in 'characters'.
- Every character must have a unique id, a name and a prompt.
- Every scene (non-final and final nodes) must include:
  - sceneCharacters: array of ids of the characters present
  - sceneEnvironment: id of the environment
  - imagePrompt: a string that STARTS with the standardized consistency header,
    followed by the scene prompt. Use EXACTLY this header format before the
    scene prompt:
{header}

Rules for imagePrompt:
- The header ALWAYS comes first. Never omit it.
- Include ONLY the sheets of the characters present in sceneCharacters.
- Respect the palette and the do-not-change restrictions in ALL scenes.
- Use the 4:3 aspect and the camera/lighting from the [STYLE PRESET] unless told otherwise.
- After the header, write the [SCENE PROMPT] in at most 2-4 concise lines, no redundant narrative.
"#,
        title = params.title,
        character = params.character_name,
        environment = params.environment,
        theme = params.theme,
        objective = params.objective,
        language = language,
        header = IMAGE_PROMPT_HEADER_TEMPLATE,
    )
}

/// JSON schema handed to the story generator so the response parses straight
/// into `models::Story`.
pub fn story_response_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "string" },
            "title": { "type": "string" },
            "synopsis": { "type": "string" },
            "characters": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "name": { "type": "string" },
                        "prompt": { "type": "string" },
                        "token": { "type": "string" }
                    },
                    "required": ["id", "name", "prompt"]
                }
            },
            "environments": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "name": { "type": "string" },
                        "description": { "type": "string" }
                    },
                    "required": ["id", "name"]
                }
            },
            "scenes": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "type": { "type": "string" },
                        "content": { "type": "string" },
                        "sceneCharacters": {
                            "type": "array",
                            "items": { "type": "string" },
                            "minItems": 1
                        },
                        "sceneEnvironment": { "type": "string" },
                        "imagePrompt": {
                            "type": "string",
                            "minLength": 120,
                            "description": "Must start with the standardized header, then the [SCENE PROMPT]."
                        },
                        "options": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "text": { "type": "string" },
                                    "targetSceneId": { "type": "string" }
                                },
                                "required": ["text", "targetSceneId"]
                            }
                        }
                    },
                    "required": ["id", "type", "content", "sceneCharacters", "sceneEnvironment", "imagePrompt"]
                }
            }
        },
        "required": ["id", "title", "synopsis", "characters", "environments", "scenes"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_template_passes_its_own_validation() {
        assert!(has_header_template(IMAGE_PROMPT_HEADER_TEMPLATE));
    }

    #[test]
    fn prompt_without_all_markers_is_rejected() {
        assert!(!has_header_template("a nice drawing of a fox"));
        assert!(!has_header_template(
            "[CHARACTER SHEET] fox sheet [SCENE PROMPT] fox runs"
        ));
    }

    #[test]
    fn story_prompt_embeds_base_data_and_header() {
        let params = StartStoryRequest {
            title: "The Lost Kite".to_string(),
            character_name: "Mila".to_string(),
            environment: "a windy hill".to_string(),
            theme: "perseverance".to_string(),
            objective: "recover the kite".to_string(),
        };
        let prompt = build_story_prompt(&params, "Spanish");
        assert!(prompt.contains("The Lost Kite"));
        assert!(prompt.contains("Mila"));
        assert!(prompt.contains("Spanish"));
        assert!(prompt.contains(CHARACTER_SHEET_MARKER));
        assert!(prompt.contains(SCENE_PROMPT_MARKER));
    }

    #[test]
    fn schema_requires_scene_image_prompt() {
        let schema = story_response_schema();
        let required = schema["properties"]["scenes"]["items"]["required"]
            .as_array()
            .expect("scene required list");
        assert!(required.iter().any(|field| field == "imagePrompt"));
    }
}
