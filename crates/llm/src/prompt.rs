//! System prompt and request assembly for the leasing assistant.

use leasing_agent_core::{ConversationHistory, GenerateRequest, Message, Speaker};

/// Instructions for the leasing assistant persona. Responses are spoken
/// aloud, so the prompt pushes hard for short plain-text answers.
pub const SYSTEM_PROMPT: &str = "\
You are a friendly leasing assistant for Boulder Mid-Term Rentals, a small \
company offering furnished mid-term rentals. You talk to callers on the \
phone, so keep every reply short and conversational: one to three sentences, \
no lists, no markdown, and spell out numbers the way you would say them.

Use the available tools to answer questions about properties, pricing, and \
availability. Never invent property details; if a tool returns nothing \
useful, say so and offer to take the caller's contact information.

When a caller sounds interested, ask for their name and email and save them \
with the save_lead tool so the team can follow up. Do not read the caller's \
email back character by character; just confirm you have it.

If the caller asks about something unrelated to rentals, politely steer the \
conversation back to their housing search.";

/// Assemble a chat request from the conversation so far plus the caller's
/// newest utterance.
pub fn build_request(
    history: &ConversationHistory,
    utterance: &str,
    temperature: f32,
    max_tokens: usize,
) -> GenerateRequest {
    let mut request = GenerateRequest::new(SYSTEM_PROMPT)
        .with_temperature(temperature)
        .with_max_tokens(max_tokens);

    for turn in history.turns() {
        if turn.text.is_empty() {
            continue;
        }
        let message = match turn.speaker {
            Speaker::Caller => Message::user(&turn.text),
            Speaker::Agent => Message::assistant(&turn.text),
        };
        request.push(message);
    }

    request.push(Message::user(utterance));
    request
}
