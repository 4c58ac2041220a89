//! Transcription prompts for vision-model page extraction.
//!
//! Every prompt lives here so changing what the model is asked to do never
//! touches retry or error-handling code in [`crate::extractors::vision`].

/// System prompt sent with every vision request.
pub const TRANSCRIPTION_SYSTEM_PROMPT: &str = "You are an expert at extracting text from document images. \
Transcribe EXACTLY the text you see in the image, keeping its original layout.";

/// User instruction for the local (Ollama) vision model.
///
/// Local models drift more, so the identifier/date rules are spelled out in full.
pub const LOCAL_TRANSCRIPTION_PROMPT: &str = r#"Analyse this image and extract ONLY the text of the main body of the document. IMPORTANT:
- Produce an EXACT transcription, keeping the original spelling
- Do NOT correct spelling or grammar mistakes
- NEVER change upper or lower case - transcribe every letter exactly as it appears
- Pay SPECIAL ATTENTION to:
  * Identification numbers (national IDs, tax IDs, etc.) - these MUST be transcribed with 100% accuracy
  * Legal document numbers and references
  * Complete street addresses
  * Any numeric or alphanumeric sequence
  * DATES in any format (DD/MM/YYYY, written out, etc.)

COMPLETELY IGNORE:
- Signatures drawn over names or text
- Stamps and seals
- Page numbers
- Letterheads and institutional headers
- Folio or registry numbers
- Watermarks
- Handwritten annotations drawn over the text

CRITICAL RULES:
- If a signature is drawn over a name, IGNORE the signature and transcribe the name
- Transcribe identification numbers DIGIT by DIGIT
- If text is struck through but legible, transcribe it and mark it as struck through
- Transcribe underlined text without marking the underline

Return ONLY the extracted text, without comments or explanations."#;

/// User instruction for the remote (OpenAI) vision model.
pub const REMOTE_TRANSCRIPTION_PROMPT: &str = r#"Analyse this image and extract ONLY the text of the main body of the document. IMPORTANT:
- Produce an EXACT transcription, keeping the original spelling
- Do NOT correct spelling or grammar mistakes
- NEVER change upper or lower case - transcribe every letter exactly as it appears
- Pay SPECIAL ATTENTION to identification numbers, street addresses, numeric or alphanumeric sequences and DATES in any format

IGNORE stamps, page numbers, letterheads, folio or registry numbers, watermarks, and signatures with their associated text.

Return ONLY the extracted text."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_ask_for_text_only() {
        assert!(LOCAL_TRANSCRIPTION_PROMPT.contains("Return ONLY the extracted text"));
        assert!(REMOTE_TRANSCRIPTION_PROMPT.contains("Return ONLY the extracted text"));
    }
}
