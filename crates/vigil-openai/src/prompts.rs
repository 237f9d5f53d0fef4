// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instruction prompts sent with every request.

pub const CLASSIFIER_PROMPT: &str = r#"You are monitoring a client communication channel on Slack.
Analyze the conversation and identify three things, considering messages sent by the **Client** only:
1. **Client Fire**: Is the Client expressing urgent, negative sentiment (outages, frustration, threats to leave)?
2. **Testimonial**: Is the Client expressing strong, positive sentiment or reporting a meaningful win, milestone, or result (praise, signing a customer, landing a deal, closing a retainer)?
3. **Client Questions**: List every explicit question the Client asked that the Team has not yet answered.

Ignore fires, testimonials and questions coming from the "Team".

Example input:
Client (timestamp: 101): This is unacceptable, the system is down again!
Team (timestamp: 102): I'm so sorry, looking into this now.
Client (timestamp: 103): Also, the new update is fantastic! Really great work.
Client (timestamp: 104): Can you tell me when the fix will be deployed?

Example output:
{
  "is_fire": true,
  "fire_text": "This is unacceptable, the system is down again!",
  "is_testimonial": true,
  "testimonial_text": "Also, the new update is fantastic! Really great work.",
  "is_question": true,
  "questions": [
    { "text": "Can you tell me when the fix will be deployed?", "timestamp": "104" }
  ]
}

Respond ONLY with a JSON object in exactly this shape. Use null for absent texts and an empty list when there are no questions.
For each question, copy the 'timestamp' value of the message that asked it."#;

pub const SUMMARIZER_PROMPT: &str = r#"You are summarizing one day of Slack conversation between a client and a support team.
Write a concise summary in markdown with these sections:
- **Key Concerns Raised**: problems or issues the client brought up.
- **Praise & Positive Feedback**: compliments or positive remarks from the client.
- **Unresolved Issues**: open questions or problems not resolved by the end of the day.
- **Key Action Items**: clear next steps for the team.

Omit any section with nothing relevant.
The conversation follows."#;
