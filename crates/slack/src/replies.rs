use rand::Rng;
use serde::Serialize;

use helpdevil_core::{Article, EditField, Team};

use crate::callbacks::encode_callback_id;
use crate::commands::AddParseError;

/// Outbound message in the legacy attachment format:
/// `{ text, attachments: [{ title, callback_id, color, fields, actions }] }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Reply {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), attachments: Vec::new() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub title: String,
    pub callback_id: String,
    pub attachment_type: String,
    /// Cosmetic only; never an identity signal.
    pub color: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<AttachmentField>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AttachmentField {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Action {
    pub name: String,
    pub text: String,
    pub value: String,
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ActionStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirm: Option<Confirmation>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Confirmation {
    pub title: String,
    pub text: String,
    pub ok_text: String,
    pub dismiss_text: String,
}

impl Action {
    pub fn button(name: impl Into<String>, label: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            value: name.clone(),
            name,
            text: label.into(),
            action_type: "button".to_string(),
            style: None,
            confirm: None,
        }
    }

    pub fn style(mut self, style: ActionStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn confirm(mut self, confirm: Confirmation) -> Self {
        self.confirm = Some(confirm);
        self
    }
}

pub struct ReplyBuilder {
    text: String,
    attachments: Vec<Attachment>,
}

impl ReplyBuilder {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), attachments: Vec::new() }
    }

    pub fn attachment<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut AttachmentBuilder),
    {
        let mut builder = AttachmentBuilder::default();
        build(&mut builder);
        self.attachments.push(builder.build());
        self
    }

    pub fn build(self) -> Reply {
        Reply { text: self.text, attachments: self.attachments }
    }
}

#[derive(Default)]
pub struct AttachmentBuilder {
    title: String,
    callback_id: String,
    fields: Vec<AttachmentField>,
    actions: Vec<Action>,
}

impl AttachmentBuilder {
    pub fn title(&mut self, title: impl Into<String>) -> &mut Self {
        self.title = title.into();
        self
    }

    pub fn callback_id(&mut self, callback_id: impl Into<String>) -> &mut Self {
        self.callback_id = callback_id.into();
        self
    }

    pub fn field(&mut self, value: impl Into<String>) -> &mut Self {
        self.fields.push(AttachmentField { title: None, value: value.into() });
        self
    }

    pub fn titled_field(&mut self, title: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.fields.push(AttachmentField { title: Some(title.into()), value: value.into() });
        self
    }

    pub fn action(&mut self, action: Action) -> &mut Self {
        self.actions.push(action);
        self
    }

    fn build(self) -> Attachment {
        Attachment {
            title: self.title,
            callback_id: self.callback_id,
            attachment_type: "default".to_string(),
            color: random_color(),
            fields: self.fields,
            actions: self.actions,
        }
    }
}

fn random_color() -> String {
    format!("#{:06x}", rand::thread_rng().gen_range(0..0x100_0000))
}

const NO_CONTENT_PLACEHOLDER: &str =
    "This article has no content yet, click `edit` to add some";

const ADD_USAGE_HINT: &str = "For adding new entries, use the following format: \
`/helpdevil add <title> > <description>`\nFor instance: `/helpdevil add Guitar > This makes music...`";

/// The full help center: one attachment per article, each with a `more`
/// button and a confirmation-guarded `delete` button.
pub fn list_reply(team: &Team) -> Reply {
    let mut builder = ReplyBuilder::new(
        "Here is your help center. Say `/helpdevil add <title> > <description>` to add articles.",
    );

    for article in &team.articles {
        let callback_id = encode_callback_id(&team.id, &article.id);
        let description = article.description.clone();
        let title = article.title.clone();
        builder = builder.attachment(move |attachment| {
            attachment
                .title(title)
                .callback_id(callback_id)
                .field(description)
                .action(Action::button("more", ":heavy_plus_sign: More"))
                .action(
                    Action::button("delete", ":x: Delete")
                        .style(ActionStyle::Danger)
                        .confirm(Confirmation {
                            title: "Are you sure?".to_string(),
                            text: "This will delete this article.".to_string(),
                            ok_text: "Yes".to_string(),
                            dismiss_text: "No".to_string(),
                        }),
                );
        });
    }

    builder.build()
}

/// One article in full, with the three edit buttons.
pub fn detail_reply(team: &Team, article: &Article) -> Reply {
    ReplyBuilder::new("You can consult and edit this article")
        .attachment(|attachment| {
            build_detail_attachment(attachment, team, article);
        })
        .build()
}

fn build_detail_attachment(attachment: &mut AttachmentBuilder, team: &Team, article: &Article) {
    let content =
        article.content.clone().unwrap_or_else(|| NO_CONTENT_PLACEHOLDER.to_string());
    attachment
        .title(article.title.clone())
        .callback_id(encode_callback_id(&team.id, &article.id))
        .field(article.description.clone())
        .titled_field("Content", content)
        .action(Action::button("editTitle", "Edit title"))
        .action(Action::button("editShortDescription", "Edit short description"))
        .action(Action::button("editContent", "Edit content"));
}

pub fn add_usage_reply(error: &AddParseError) -> Reply {
    match error {
        AddParseError::MissingSeparator => Reply::plain(ADD_USAGE_HINT),
        AddParseError::TooManySeparators => Reply::plain(format!(
            "You cannot use the symbol `>` more than once.\n\n{ADD_USAGE_HINT}"
        )),
    }
}

pub fn added_confirmation_reply(title: &str) -> Reply {
    Reply::plain(format!(
        "{title} has been added to the help center. Say `/helpdevil list` to view or manage it."
    ))
}

pub fn empty_center_reply() -> Reply {
    Reply::plain(
        "The help center is empty. Say `/helpdevil add <title> > <description>` to add articles.",
    )
}

pub fn help_reply() -> Reply {
    Reply::plain(
        "I can tell you everything you need to know in this company.\n\
         Try `/helpdevil list` to see all subjects you can get help with.\n\n\
         You can also add new entries like this: `/helpdevil add <title> > <description>`\n\
         For instance: `/helpdevil add Guitar > This makes music...`",
    )
}

pub fn unknown_command_reply(text: &str) -> Reply {
    Reply::plain(format!("I'm afraid I don't know how to {text} yet."))
}

/// Demo card behind `/helpdevil button`, kept from the original surface.
pub fn button_demo_reply() -> Reply {
    ReplyBuilder::new("")
        .attachment(|attachment| {
            attachment
                .title("Do you want to interact with my buttons?")
                .callback_id("button-demo")
                .action(Action::button("yes", "Yes"))
                .action(Action::button("no", "No"));
        })
        .build()
}

pub fn edit_question(field: EditField) -> String {
    format!(
        "Tell me what the new *{}* should be.\n\
         You only have to write it down for me, or say `cancel` if you've changed your mind.",
        field.label()
    )
}

pub fn edit_cancelled_reply() -> Reply {
    Reply::plain("OK, I'm not editing anything.")
}

/// Confirmation plus the refreshed article card in one message.
pub fn edit_applied_reply(team: &Team, article: &Article, field: EditField) -> Reply {
    ReplyBuilder::new(format!(
        "The {} has been updated. You can check it out :arrow_down:",
        field.label()
    ))
    .attachment(|attachment| {
        build_detail_attachment(attachment, team, article);
    })
    .build()
}

pub fn article_gone_reply() -> Reply {
    Reply::plain("This article no longer exists, so there is nothing to edit.")
}

pub fn welcome_reply() -> Reply {
    Reply::plain(
        "I am a bot that has just joined your team.\n\
         You must now /invite me to a channel so that I can be of use!",
    )
}
