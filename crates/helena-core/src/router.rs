//! Content routing
//!
//! Turns a raw backend answer into something the preview pane can show.
//! Every answer lands in exactly one of three kinds: an inline image, a full
//! HTML document that is shown as-is, or long-form text that gets wrapped in
//! a reading template.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::backend::{GenerationResponse, ImagePart};

/// Prefix that marks a response as a complete HTML document.
pub const DOCTYPE_MARKER: &str = "<!DOCTYPE html>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderableContent {
    Image { mime_type: String, data: String },
    Markup { document: String },
    Text { raw: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Image,
    Markup,
    Text,
}

impl RenderableContent {
    pub fn kind(&self) -> ContentKind {
        match self {
            RenderableContent::Image { .. } => ContentKind::Image,
            RenderableContent::Markup { .. } => ContentKind::Markup,
            RenderableContent::Text { .. } => ContentKind::Text,
        }
    }

    /// Decoded image bytes, for image content with a valid payload.
    pub fn image_bytes(&self) -> Option<Vec<u8>> {
        match self {
            RenderableContent::Image { data, .. } => STANDARD.decode(data.trim()).ok(),
            _ => None,
        }
    }

    /// File extension matching the image mime type.
    pub fn image_extension(&self) -> Option<&'static str> {
        match self {
            RenderableContent::Image { mime_type, .. } => Some(match mime_type.as_str() {
                "image/png" => "png",
                "image/webp" => "webp",
                "image/gif" => "gif",
                _ => "jpg",
            }),
            _ => None,
        }
    }

    /// The HTML document handed to the preview.
    pub fn preview_document(&self) -> String {
        match self {
            RenderableContent::Image { mime_type, data } => image_document(mime_type, data),
            RenderableContent::Markup { document } => document.clone(),
            RenderableContent::Text { raw } => text_document(raw),
        }
    }
}

/// Classify a payload. An image part always wins; its text is only a caption.
pub fn classify(text: &str, image: Option<&ImagePart>) -> RenderableContent {
    if let Some(image) = image {
        return RenderableContent::Image {
            mime_type: image.mime_type.clone(),
            data: image.data.clone(),
        };
    }

    if text.starts_with(DOCTYPE_MARKER) {
        RenderableContent::Markup {
            document: text.to_string(),
        }
    } else {
        RenderableContent::Text {
            raw: text.to_string(),
        }
    }
}

/// Route a full backend response, using its first image part if any.
pub fn route(response: &GenerationResponse) -> RenderableContent {
    classify(response.text.trim(), response.first_image())
}

/// Paragraph breaks first, then the remaining single line breaks.
pub fn format_long_form(text: &str) -> String {
    text.replace("\n\n", "<br><br>").replace('\n', "<br>")
}

fn image_document(mime_type: &str, data: &str) -> String {
    format!(
        r#"<div style="text-align: center; padding: 20px; background-color: #0f172a; height: 100vh;">
    <h2 style="color: #fff; margin-bottom: 20px;">Generated 3D/4K Image</h2>
    <img src="data:{mime_type};base64,{data}" alt="Image generated by Helena" style="max-width: 90%; height: auto; border-radius: 8px; box-shadow: 0 4px 12px rgba(0,0,0,0.5);">
</div>"#
    )
}

fn text_document(raw: &str) -> String {
    let formatted = format_long_form(raw);
    format!(
        r#"<html lang="en">
<head>
    <meta charset="UTF-8">
    <style>
        body {{ font-family: Garamond, serif; padding: 40px; background-color: #fcfcfc; color: #111; line-height: 1.6; }}
        h1, h2, h3 {{ color: #880000; margin-top: 25px; }}
        pre {{ white-space: pre-wrap; word-wrap: break-word; }}
    </style>
</head>
<body>
    <h1 style="text-align: center; color: #333;">Generated Book/Content</h1>
    <hr>
    <pre>{formatted}</pre>
</body>
</html>"#
    )
}

/// Preview shown before the first response arrives.
pub fn welcome_document() -> String {
    r#"<div style="padding: 40px; text-align: center; background-color: #0f172a; color: #fff; height: 100vh;">
    <h1 style="color: #ef4444; font-size: 2.5rem;">Helena, Digital Writer</h1>
    <p style="margin-top: 15px; font-size: 1.2rem; color: #9ca3af;">
        Ask for an app, some HTML, a book or a 3D/4K image in the chat. The result will appear here in the preview.
    </p>
</div>"#
        .to_string()
}

/// Fixed document shown in place of the preview when a request fails.
pub fn error_document(description: &str) -> String {
    format!(
        r#"<div style="padding: 20px; color: red; background: #374151; border-radius: 8px;">
    Error while processing the creation: {description}
</div>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(data: &str) -> ImagePart {
        ImagePart {
            mime_type: "image/png".to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn long_form_breaks() {
        assert_eq!(format_long_form("A\n\nB\nC"), "A<br><br>B<br>C");
    }

    #[test]
    fn long_form_odd_number_of_newlines() {
        // three newlines: one paragraph break plus one line break
        assert_eq!(format_long_form("A\n\n\nB"), "A<br><br><br>B");
    }

    #[test]
    fn image_part_wins_over_doctype() {
        let content = classify("<!DOCTYPE html><p>caption</p>", Some(&png("aGk=")));
        assert_eq!(content.kind(), ContentKind::Image);
        assert!(content
            .preview_document()
            .contains("data:image/png;base64,aGk="));
    }

    #[test]
    fn doctype_passes_through_unmodified() {
        let doc = "<!DOCTYPE html>\n<html>\n\n<body>hi</body></html>";
        let content = classify(doc, None);
        assert_eq!(content.kind(), ContentKind::Markup);
        assert_eq!(content.preview_document(), doc);
    }

    #[test]
    fn doctype_must_be_a_prefix() {
        let content = classify("Here you go:\n<!DOCTYPE html>", None);
        assert_eq!(content.kind(), ContentKind::Text);
    }

    #[test]
    fn text_is_wrapped_in_reading_template() {
        let content = classify("Chapter 1\n\nIt was a dark night.\nThe end.", None);
        let doc = content.preview_document();
        assert!(doc.contains("Generated Book/Content"));
        assert!(doc.contains("<pre>Chapter 1<br><br>It was a dark night.<br>The end.</pre>"));
        assert_eq!(
            content,
            RenderableContent::Text {
                raw: "Chapter 1\n\nIt was a dark night.\nThe end.".to_string()
            }
        );
    }

    #[test]
    fn classify_is_deterministic() {
        let inputs = [
            ("plain", None),
            ("<!DOCTYPE html>", None),
            ("", None),
            ("caption", Some(png("AAAA"))),
        ];
        for (text, image) in inputs.iter() {
            let a = classify(text, image.as_ref());
            let b = classify(text, image.as_ref());
            assert_eq!(a, b);
            assert_eq!(a.preview_document(), b.preview_document());
        }
    }

    #[test]
    fn route_trims_and_uses_first_image() {
        let response = GenerationResponse {
            text: "  <!DOCTYPE html><html></html>\n".to_string(),
            images: vec![],
        };
        assert_eq!(
            route(&response),
            RenderableContent::Markup {
                document: "<!DOCTYPE html><html></html>".to_string()
            }
        );

        let response = GenerationResponse {
            text: "a dragon".to_string(),
            images: vec![png("first"), png("second")],
        };
        match route(&response) {
            RenderableContent::Image { data, .. } => assert_eq!(data, "first"),
            other => panic!("expected image, got {:?}", other),
        }
    }

    #[test]
    fn image_bytes_decode_payload() {
        let content = classify("", Some(&png("aGVsbG8=")));
        assert_eq!(content.image_bytes().as_deref(), Some(&b"hello"[..]));
        assert_eq!(content.image_extension(), Some("png"));

        let broken = classify("", Some(&png("not base64!")));
        assert!(broken.image_bytes().is_none());
        assert!(classify("text", None).image_bytes().is_none());
    }

    #[test]
    fn error_document_mentions_description() {
        assert!(error_document("timeout").contains("timeout"));
    }
}
