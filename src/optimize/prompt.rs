//! Prompt template for speech-friendly rewriting.

/// System message sent with every rewrite request.
pub const SYSTEM_PROMPT: &str = "You are an editor preparing written documents to be read aloud by a \
text-to-speech engine. Rewrite the text you are given so that it sounds natural when spoken. \
Keep the meaning, order and language of the original. Return only the rewritten text, with no \
preamble, commentary or formatting.";

const INSTRUCTIONS: &str = "Rewrite the following text for text-to-speech:
- Expand abbreviations and acronyms the way a speaker would say them (e.g. \"e.g.\" becomes \"for example\").
- Write numbers, dates, units and currency amounts out in words.
- Add pronunciation hints for technical terms and names that a speech engine is likely to mispronounce.
- Replace symbols such as &, %, /, +, = and > with words.
- Insert natural pauses with commas and sentence breaks where a reader would breathe.
- Remove leftover markup artifacts such as asterisks, hashes, pipes, backticks and bracket syntax.
- Paraphrase URLs and file paths instead of spelling them out character by character.
- Replace code blocks with a short spoken description of what the code does.";

/// User message for one chunk of text.
pub fn user_prompt(text: &str) -> String {
    format!("{}\n\nText:\n{}", INSTRUCTIONS, text)
}
