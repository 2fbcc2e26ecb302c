//! Notification rendering.
//!
//! Each notifier's subject, intro, and per-field display templates are
//! compiled once at startup together with the fixed HTML and plain-text
//! body skeletons. The compiled environment is immutable and shared
//! read-only across concurrent requests.

use std::collections::BTreeMap;
use std::sync::Arc;

use minijinja::{context, Environment};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::schema::{FieldType, Form, Notifier};
use crate::notify::mailer::{MailError, Mailer, OutgoingEmail};

/// Built-in HTML body skeleton. Field values are auto-escaped.
const HTML_SKELETON: &str = r#"<!DOCTYPE html>
<html lang="{{ lang }}">
<head>
<meta charset="utf-8" />
<title>{{ subject }}</title>
</head>
<body>
  <h1>{{ subject }}</h1>
  {%- if intro %}
  <p style="font-size: 14px; line-height: 24px; margin: 16px 0">{{ intro }}</p>
  {%- endif %}
  {%- for field in fields %}
  <h2>{{ field.label }}</h2>
  {%- if field.items is not none %}
  <ul style="font-size: 14px; line-height: 24px; margin: 16px 0">
    {%- for item in field.items %}
    <li>{{ item }}</li>
    {%- endfor %}
  </ul>
  {%- else %}
  <p style="font-size: 14px; line-height: 24px; margin: 16px 0">{{ field.value }}</p>
  {%- endif %}
  {%- endfor %}
</body>
</html>
"#;

/// Built-in plain-text body skeleton.
const TEXT_SKELETON: &str = r#"{%- if intro %}{{ intro }}
{% endif %}
{%- for field in fields %}
{%- if field.items is not none %}
{{ field.label }}:
{%- for item in field.items %}
  - {{ item }}
{%- endfor %}
{%- else %}
{{ field.label }}: {{ field.value }}
{%- endif %}
{%- endfor %}
"#;

/// Error type for template compilation and rendering.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("failed to compile template {name:?}: {source}")]
    Compile {
        name: String,
        source: minijinja::Error,
    },

    #[error("failed to render template {name:?}: {source}")]
    Render {
        name: String,
        source: minijinja::Error,
    },
}

/// Rendering or dispatch failure for one notifier.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Mail(#[from] MailError),
}

/// One field of the rendered message body.
#[derive(Debug, Serialize)]
struct RenderedField {
    label: String,
    value: Option<String>,
    items: Option<Vec<String>>,
}

/// A notifier compiled into ready-to-execute form.
pub struct NotifierRuntime {
    from: String,
    to: String,
    lang: String,
    field_order: Vec<String>,
    hidden_fields: Vec<String>,
    object_fields: Vec<String>,
    env: Environment<'static>,
    mailer: Arc<dyn Mailer>,
}

impl std::fmt::Debug for NotifierRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierRuntime")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("lang", &self.lang)
            .field("field_order", &self.field_order)
            .field("hidden_fields", &self.hidden_fields)
            .field("object_fields", &self.object_fields)
            .finish_non_exhaustive()
    }
}

impl NotifierRuntime {
    /// Compile the notifier's templates against the form's field schemas.
    pub fn new(
        form: &Form,
        notifier: &Notifier,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, TemplateError> {
        let mut env = Environment::new();

        let add = |env: &mut Environment<'static>, name: String, source: String| {
            env.add_template_owned(name.clone(), source)
                .map_err(|source| TemplateError::Compile { name, source })
        };

        add(&mut env, "subject.txt".into(), notifier.subject.clone())?;
        add(&mut env, "intro.txt".into(), notifier.intro.clone())?;
        add(&mut env, "body.html".into(), HTML_SKELETON.into())?;
        add(&mut env, "body.txt".into(), TEXT_SKELETON.into())?;

        let mut object_fields = Vec::new();

        for (name, field) in &form.fields {
            if field.kind != FieldType::Objects {
                continue;
            }

            add(
                &mut env,
                display_template_name(name),
                field.display_template.clone(),
            )?;
            object_fields.push(name.clone());
        }

        Ok(Self {
            from: notifier.from.clone(),
            to: notifier.to.clone(),
            lang: notifier.lang.clone(),
            field_order: notifier.field_order.clone(),
            hidden_fields: notifier.hidden_fields.clone(),
            object_fields,
            env,
            mailer,
        })
    }

    /// Render the notification for a validated payload and hand it to the
    /// outbound mailer.
    pub async fn notify(
        &self,
        form: &Form,
        payload: &Map<String, Value>,
    ) -> Result<(), NotifyError> {
        let mail = self.render(form, payload)?;
        self.mailer.send(&mail).await?;

        Ok(())
    }

    /// Render subject, intro, and both bodies against the payload.
    pub fn render(
        &self,
        form: &Form,
        payload: &Map<String, Value>,
    ) -> Result<OutgoingEmail, TemplateError> {
        let base = context! {
            payload => payload,
            fields => &form.fields,
            lang => &self.lang,
            order => &self.field_order,
            hidden => &self.hidden_fields,
        };

        let subject = self.render_named("subject.txt", &base)?;
        let intro = self.render_named("intro.txt", &base)?;
        let lists = self.render_object_lists(payload)?;
        let fields = self.body_fields(form, payload, &lists);

        let body_ctx = context! {
            lang => &self.lang,
            subject => &subject,
            intro => &intro,
            fields => &fields,
        };

        let html_body = self.render_named("body.html", &body_ctx)?;
        let text_body = self.render_named("body.txt", &body_ctx)?;

        Ok(OutgoingEmail {
            from: self.from.clone(),
            to: self.to.clone(),
            subject,
            html_body,
            text_body,
        })
    }

    fn render_named(
        &self,
        name: &str,
        ctx: &minijinja::Value,
    ) -> Result<String, TemplateError> {
        let template = self
            .env
            .get_template(name)
            .map_err(|source| TemplateError::Render {
                name: name.to_string(),
                source,
            })?;

        template.render(ctx).map_err(|source| TemplateError::Render {
            name: name.to_string(),
            source,
        })
    }

    /// Render every element of every object-array field through its
    /// display template, keeping array order.
    fn render_object_lists(
        &self,
        payload: &Map<String, Value>,
    ) -> Result<BTreeMap<String, Vec<String>>, TemplateError> {
        let mut lists = BTreeMap::new();

        for name in &self.object_fields {
            let mut lines = Vec::new();

            if let Some(Value::Array(elements)) = payload.get(name) {
                let template_name = display_template_name(name);

                for element in elements {
                    let template = self.env.get_template(&template_name).map_err(|source| {
                        TemplateError::Render {
                            name: template_name.clone(),
                            source,
                        }
                    })?;

                    let line = template.render(element).map_err(|source| {
                        TemplateError::Render {
                            name: template_name.clone(),
                            source,
                        }
                    })?;

                    lines.push(line);
                }
            }

            lists.insert(name.clone(), lines);
        }

        Ok(lists)
    }

    /// Assemble the ordered field list for the body skeletons: declared
    /// order when configured, otherwise payload iteration minus hidden
    /// fields.
    fn body_fields(
        &self,
        form: &Form,
        payload: &Map<String, Value>,
        lists: &BTreeMap<String, Vec<String>>,
    ) -> Vec<RenderedField> {
        let keys: Vec<&String> = if self.field_order.is_empty() {
            payload
                .keys()
                .filter(|k| !self.hidden_fields.contains(k))
                .collect()
        } else {
            self.field_order.iter().collect()
        };

        keys.into_iter()
            .map(|key| {
                let label = form
                    .fields
                    .get(key)
                    .filter(|f| !f.display_name.is_empty())
                    .map_or_else(|| key.clone(), |f| f.display_name.clone());

                match lists.get(key) {
                    Some(lines) => RenderedField {
                        label,
                        value: None,
                        items: Some(lines.clone()),
                    },
                    None => RenderedField {
                        label,
                        value: Some(scalar_text(payload.get(key))),
                        items: None,
                    },
                }
            })
            .collect()
    }
}

fn display_template_name(field: &str) -> String {
    format!("field/{field}.txt")
}

/// Plain-text rendering of a scalar payload value. Absent optional fields
/// render as the empty string.
fn scalar_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
