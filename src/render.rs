use crate::models::Message;

/// Headings emitted by [`render_message`], in the order they can appear.
pub const SECTION_HEADINGS: [&str; 5] = [
  "Summary",
  "Step-by-Step Guide",
  "Key Points",
  "Examples",
  "Related Topics",
];

pub fn render_message(message: &Message) -> String {
  let structured = match message.structured.as_ref().filter(|s| !s.is_empty()) {
    Some(s) => s,
    None => return message.content.clone(),
  };

  let mut out = String::new();

  if let Some(summary) = structured.summary.as_deref().filter(|s| !s.trim().is_empty()) {
    heading(&mut out, "Summary");
    out.push_str(summary);
    out.push('\n');
  }

  if let Some(steps) = structured.steps.as_deref().filter(|s| !s.is_empty()) {
    heading(&mut out, "Step-by-Step Guide");
    for (idx, step) in steps.iter().enumerate() {
      out.push_str(&format!("{}. {}\n", idx + 1, step.title));
      if !step.description.is_empty() {
        out.push_str(&format!("   {}\n", step.description));
      }
      for detail in step.details.as_deref().unwrap_or_default() {
        out.push_str(&format!("   - {detail}\n"));
      }
    }
  }

  if let Some(points) = structured.key_points.as_deref().filter(|p| !p.is_empty()) {
    heading(&mut out, "Key Points");
    for point in points {
      out.push_str(&format!("→ {point}\n"));
    }
  }

  if let Some(examples) = structured.examples.as_deref().filter(|e| !e.is_empty()) {
    heading(&mut out, "Examples");
    for example in examples {
      out.push_str(example);
      out.push('\n');
    }
  }

  if let Some(topics) = structured.related_topics.as_deref().filter(|t| !t.is_empty()) {
    heading(&mut out, "Related Topics");
    let tags: Vec<String> = topics.iter().map(|t| format!("[{t}]")).collect();
    out.push_str(&tags.join(" "));
    out.push('\n');
  }

  if !out.is_empty() {
    out.push('\n');
  }
  out.push_str("---\n");
  out.push_str(&message.content);
  out
}

fn heading(out: &mut String, text: &str) {
  if !out.is_empty() {
    out.push('\n');
  }
  out.push_str(text);
  out.push('\n');
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::{Step, StructuredResponse};

  fn assistant_with(structured: StructuredResponse, content: &str) -> Message {
    let mut message = Message::assistant(content, "gemini-2.0-flash");
    message.structured = Some(structured);
    message
  }

  #[test]
  fn plain_messages_come_back_verbatim() {
    let message = Message::assistant("line one\nline two", "gemini-2.0-flash");
    assert_eq!(render_message(&message), "line one\nline two");
  }

  #[test]
  fn summary_alone_yields_one_section_plus_raw_block() {
    let structured = StructuredResponse {
      summary: Some("Only this.".to_string()),
      ..Default::default()
    };
    let message = assistant_with(structured, "Raw.");
    assert_eq!(render_message(&message), "Summary\nOnly this.\n\n---\nRaw.");
  }

  #[test]
  fn all_sections_appear_in_fixed_order() {
    let structured = StructuredResponse {
      summary: Some("How addition works".to_string()),
      steps: Some(vec![
        Step {
          title: "Line up the numbers".to_string(),
          description: "Write both numbers in a column.".to_string(),
          details: Some(vec![
            "ones under ones".to_string(),
            "tens under tens".to_string(),
          ]),
        },
        Step {
          title: "Add each column".to_string(),
          description: "Start from the right.".to_string(),
          details: None,
        },
      ]),
      key_points: Some(vec![
        "2+2=4".to_string(),
        "Order does not matter".to_string(),
      ]),
      examples: Some(vec!["2 + 2 = 4".to_string()]),
      related_topics: Some(vec!["arithmetic".to_string(), "carrying".to_string()]),
    };
    let message = assistant_with(structured, "raw reply text");

    let expected = [
      "Summary",
      "How addition works",
      "",
      "Step-by-Step Guide",
      "1. Line up the numbers",
      "   Write both numbers in a column.",
      "   - ones under ones",
      "   - tens under tens",
      "2. Add each column",
      "   Start from the right.",
      "",
      "Key Points",
      "→ 2+2=4",
      "→ Order does not matter",
      "",
      "Examples",
      "2 + 2 = 4",
      "",
      "Related Topics",
      "[arithmetic] [carrying]",
      "",
      "---",
      "raw reply text",
    ]
    .join("\n");
    assert_eq!(render_message(&message), expected);

    let rendered = render_message(&message);
    for heading in SECTION_HEADINGS {
      assert!(rendered.lines().any(|line| line == heading));
    }
  }

  #[test]
  fn empty_sections_are_skipped_independently() {
    let structured = StructuredResponse {
      summary: Some("sum".to_string()),
      key_points: Some(Vec::new()),
      ..Default::default()
    };
    let message = assistant_with(structured, "raw");
    assert_eq!(render_message(&message), "Summary\nsum\n\n---\nraw");
  }

  #[test]
  fn fully_empty_payload_renders_as_plain_text() {
    let message = assistant_with(StructuredResponse::default(), "just text");
    assert_eq!(render_message(&message), "just text");
  }
}
