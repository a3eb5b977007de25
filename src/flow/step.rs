//! Step catalog — the ordered, immutable definition of the intake steps.
//!
//! Each step is a pure descriptor: a validator over the raw event (plus the
//! answers accumulated so far, for branch-dependent checks), a projection
//! producing the stored value, and a next-step function. The engine owns all
//! side effects; nothing here touches a session.

use serde::{Deserialize, Serialize};

use crate::flow::branch::BranchTable;
use crate::flow::event::{Event, RejectReason};

/// Маркер «назад к датам» на шаге выбора времени.
pub const BACK_TO_DATES: &str = "⬅️ Назад к датам";

/// Ответы на шаге противопоказаний.
pub const CONSENT_OPTIONS: [&str; 2] = ["Нет", "✅ Я согласен(а)"];

/// Варианты услуги на шаге подтверждения.
pub const SERVICE_OPTIONS: [&str; 3] = [
    "💆 Спина + ноги — 5000₽",
    "💆 Спина + ноги + грудь — 7000₽",
    "🔥 Комплекс — 15000₽",
];

/// Текст противопоказаний, показывается перед подтверждением согласия.
pub const CONTRA_TEXT: &str = "⚠️ ПРОТИВОПОКАЗАНИЯ\n\n\
Процедура не проводится при:\n\
— беременности\n\
— онкологических заболеваниях\n\
— острых воспалительных процессах\n\
— повышенной температуре\n\
— кожных заболеваниях в стадии обострения\n\
— серьёзных сердечно-сосудистых заболеваниях\n\n\
Если противопоказаний нет — выберите «Нет». Если сомневаетесь, \
проконсультируйтесь со специалистом и подтвердите согласие.";

const MAX_TEXT_ANSWER: usize = 256;

/// Identifier of one intake step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    Name,
    Contact,
    Date,
    Time,
    Contraindications,
    Service,
    PaymentProof,
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Name => "name",
            Self::Contact => "contact",
            Self::Date => "date",
            Self::Time => "time",
            Self::Contraindications => "contraindications",
            Self::Service => "service",
            Self::PaymentProof => "payment_proof",
        };
        write!(f, "{s}")
    }
}

/// Where the flow goes after a step is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    Step(StepId),
    /// Terminal marker: finalize and clear the session.
    Done,
}

/// Result of a step's validator: the projected value to merge into the
/// session's answers, or a flow control marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projected {
    /// Store `value` under the step's field and move forward.
    Value(String),
    /// The final attachment; not merged into answers, carried to the
    /// finalizer as the submission's attachment reference.
    Attachment(crate::flow::event::AttachmentRef),
    /// Re-enter an earlier step without storing anything ("back to dates").
    Back,
}

/// One addressable stage of the intake flow.
#[derive(Debug, Clone)]
pub struct Step {
    pub id: StepId,
    /// Stable field name the projected answer is stored under.
    pub field: &'static str,
    /// Question shown to the user when this step becomes current.
    pub prompt: &'static str,
}

impl Step {
    /// Validate a raw event against this step and the answers accumulated so
    /// far. Pure; the caller merges the projected value.
    pub fn validate(
        &self,
        event: &Event,
        answers: &std::collections::HashMap<String, String>,
        branches: &BranchTable,
    ) -> Result<Projected, RejectReason> {
        match self.id {
            StepId::Name | StepId::Contact => {
                let raw = text_payload(event)?;
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Err(RejectReason::InvalidInput("Ответ не может быть пустым."));
                }
                if trimmed.len() > MAX_TEXT_ANSWER {
                    return Err(RejectReason::InvalidInput("Слишком длинный ответ."));
                }
                Ok(Projected::Value(trimmed.to_string()))
            }
            StepId::Date => {
                let raw = text_payload(event)?;
                if branches.options_for(raw).is_empty() {
                    return Err(RejectReason::UnknownOption(raw.to_string()));
                }
                Ok(Projected::Value(raw.to_string()))
            }
            StepId::Time => {
                let raw = text_payload(event)?;
                if raw == BACK_TO_DATES {
                    return Ok(Projected::Back);
                }
                // Times are only valid for the previously chosen date.
                let date = answers.get("date").map(String::as_str).unwrap_or("");
                if !branches.options_for(date).iter().any(|t| t == raw) {
                    return Err(RejectReason::UnknownOption(raw.to_string()));
                }
                Ok(Projected::Value(raw.to_string()))
            }
            StepId::Contraindications => {
                let raw = text_payload(event)?;
                if !CONSENT_OPTIONS.contains(&raw) {
                    return Err(RejectReason::UnknownOption(raw.to_string()));
                }
                Ok(Projected::Value(raw.to_string()))
            }
            StepId::Service => {
                let raw = text_payload(event)?;
                if !SERVICE_OPTIONS.contains(&raw) {
                    return Err(RejectReason::UnknownOption(raw.to_string()));
                }
                Ok(Projected::Value(raw.to_string()))
            }
            StepId::PaymentProof => match event {
                Event::Attachment(handle) => Ok(Projected::Attachment(handle.clone())),
                _ => Err(RejectReason::AttachmentRequired),
            },
        }
    }

    /// Identifier of the step that follows, given the projected answer.
    pub fn next(&self, projected: &Projected) -> NextStep {
        if matches!(projected, Projected::Back) {
            return NextStep::Step(StepId::Date);
        }
        match self.id {
            StepId::Name => NextStep::Step(StepId::Contact),
            StepId::Contact => NextStep::Step(StepId::Date),
            StepId::Date => NextStep::Step(StepId::Time),
            StepId::Time => NextStep::Step(StepId::Contraindications),
            StepId::Contraindications => NextStep::Step(StepId::Service),
            StepId::Service => NextStep::Step(StepId::PaymentProof),
            StepId::PaymentProof => NextStep::Done,
        }
    }

    /// The fixed option set for this step, branch-resolved where needed.
    /// Empty for free-text and attachment steps.
    pub fn options(
        &self,
        answers: &std::collections::HashMap<String, String>,
        branches: &BranchTable,
    ) -> Vec<String> {
        match self.id {
            StepId::Date => branches.selectors(),
            StepId::Time => {
                let date = answers.get("date").map(String::as_str).unwrap_or("");
                let mut options: Vec<String> = branches.options_for(date).to_vec();
                options.push(BACK_TO_DATES.to_string());
                options
            }
            StepId::Contraindications => CONSENT_OPTIONS.iter().map(|s| s.to_string()).collect(),
            StepId::Service => SERVICE_OPTIONS.iter().map(|s| s.to_string()).collect(),
            _ => Vec::new(),
        }
    }
}

/// Extract the textual payload of an event, or reject attachments on
/// non-attachment steps. Text and selections are validated identically —
/// users may type an option instead of pressing the button.
fn text_payload(event: &Event) -> Result<&str, RejectReason> {
    match event {
        Event::Text(raw) | Event::Selection(raw) => Ok(raw.as_str()),
        Event::Attachment(_) => Err(RejectReason::TextRequired),
        Event::Start => Err(RejectReason::TextRequired),
    }
}

/// The ordered, immutable step catalog. Built once at process start.
#[derive(Debug, Clone)]
pub struct Catalog {
    steps: Vec<Step>,
    branches: BranchTable,
}

impl Catalog {
    pub fn new(branches: BranchTable) -> Self {
        let steps = vec![
            Step {
                id: StepId::Name,
                field: "name",
                prompt: "Введите ваше ФИО:",
            },
            Step {
                id: StepId::Contact,
                field: "contact",
                prompt: "Введите ваш номер телефона или другой контакт для связи:",
            },
            Step {
                id: StepId::Date,
                field: "date",
                prompt: "Выберите удобную дату:",
            },
            Step {
                id: StepId::Time,
                field: "time",
                prompt: "Выберите удобное время:",
            },
            Step {
                id: StepId::Contraindications,
                field: "contraindications",
                prompt: CONTRA_TEXT,
            },
            Step {
                id: StepId::Service,
                field: "service",
                prompt: "Выберите вариант услуги:",
            },
            Step {
                id: StepId::PaymentProof,
                field: "payment_proof",
                prompt: "Оплатите по реквизитам и пришлите скриншот чека:",
            },
        ];
        Self { steps, branches }
    }

    /// The first step of the flow.
    pub fn initial(&self) -> &Step {
        &self.steps[0]
    }

    pub fn step_for(&self, id: StepId) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn branches(&self) -> &BranchTable {
        &self.branches
    }

    /// Answer field names in catalog order (used to order submission rows).
    pub fn fields(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.field).collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(BranchTable::default())
    }
}
