use std::collections::HashMap;

/// A rendered notification: subject line plus body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub subject: String,
    pub body: String,
}

/// Render a template id with its fields.
///
/// Unknown template ids render a generic notification rather than failing:
/// an emergency message with a stale template id must still go out.
#[must_use]
pub fn render(template: &str, fields: &HashMap<String, String>) -> Rendered {
    let get = |key: &str| fields.get(key).map_or("?", String::as_str).to_owned();
    match template {
        "emergency_opened" => Rendered {
            subject: format!("[Carelink] Emergency: {}", get("category")),
            body: format!(
                "An emergency was detected (category {}, severity {}). \
                 Incident {}. The escalation ladder is running; please respond \
                 to the incoming call or open the family app.",
                get("category"),
                get("severity"),
                get("incident"),
            ),
        },
        "incident_resolved" => Rendered {
            subject: "[Carelink] Incident resolved".into(),
            body: format!("Incident {} was acknowledged and closed.", get("incident")),
        },
        "device_failure" => Rendered {
            subject: "[Carelink] Device needs attention".into(),
            body: format!(
                "A safety-critical device command failed (utterance {}). \
                 Please check on the household.",
                get("utterance"),
            ),
        },
        other => Rendered {
            subject: format!("[Carelink] {other}"),
            body: fields
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join("\n"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emergency_template_includes_fields() {
        let fields = HashMap::from([
            ("category".to_owned(), "medical".to_owned()),
            ("severity".to_owned(), "4".to_owned()),
            ("incident".to_owned(), "inc-1".to_owned()),
        ]);
        let rendered = render("emergency_opened", &fields);
        assert!(rendered.subject.contains("medical"));
        assert!(rendered.body.contains("severity 4"));
        assert!(rendered.body.contains("inc-1"));
    }

    #[test]
    fn unknown_template_still_renders() {
        let fields = HashMap::from([("note".to_owned(), "hello".to_owned())]);
        let rendered = render("whatever", &fields);
        assert!(rendered.subject.contains("whatever"));
        assert!(rendered.body.contains("note: hello"));
    }
}
