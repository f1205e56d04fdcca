use crate::config::Settings;
use crate::domain::notification::Notification;

/// The settings every template may reference.
#[derive(Debug, Clone)]
pub struct TemplateContext {
    pub app_name: String,
    pub admin_email: String,
    pub stream_url: String,
}

impl TemplateContext {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            app_name: settings.app_name.clone(),
            admin_email: settings.admin_email.clone(),
            stream_url: settings.youtube_streams_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub body: String,
}

/// Renders an intent into a concrete message. Returns None when the intent
/// has no reachable recipient (winner without email, blank admin address);
/// callers log and skip in that case.
///
/// Rendering is a pure function of the intent and the context, so the same
/// intent always yields the same message.
pub fn render(notification: &Notification, ctx: &TemplateContext) -> Option<OutboundEmail> {
    let app = &ctx.app_name;
    match notification {
        Notification::Winner {
            round,
            number,
            recipient,
        } => {
            let to = recipient.notifiable_email()?.to_string();
            Some(OutboundEmail {
                to,
                to_name: recipient.name.clone(),
                subject: format!("🎉 {app}: Você venceu o {}!", round.label),
                body: format!(
                    "Olá, {}!\n\n\
                     Parabéns! Você é o vencedor do {}.\n\
                     Número vencedor: {}\n\n\
                     Nossa equipe entrará em contato com as próximas instruções.\n\
                     Se você não reconhece esta mensagem, por favor, ignore.\n\n\
                     Atenciosamente,\n{app}\n",
                    recipient.display_name(),
                    round.label,
                    number,
                ),
            })
        }
        Notification::Loser {
            round,
            number,
            winner_name,
            recipient,
        } => {
            let to = recipient.notifiable_email()?.to_string();
            Some(OutboundEmail {
                to,
                to_name: recipient.name.clone(),
                subject: format!("{app}: Resultado do {}", round.label),
                body: format!(
                    "Olá, {}!\n\n\
                     O {} foi encerrado.\n\
                     Número sorteado: {}\n\
                     Ganhador(a): {}\n\n\
                     Não foi dessa vez, mas um novo sorteio já está aberto.\n\
                     Boa sorte na próxima! 🍀\n\n\
                     Atenciosamente,\n{app}\n",
                    recipient.display_name(),
                    round.label,
                    number,
                    winner_name,
                ),
            })
        }
        Notification::AdminSummary {
            round,
            number,
            winner_name,
            winner_email,
            closed_at,
        } => {
            let to = ctx.admin_email.trim();
            if to.is_empty() {
                return None;
            }
            Some(OutboundEmail {
                to: to.to_string(),
                to_name: None,
                subject: format!("✅ {app}: {} FECHADO", round.label),
                body: format!(
                    "{} foi fechado.\n\n\
                     Número sorteado (vencedor): {}\n\n\
                     Ganhador:\n\
                     - Nome:  {}\n\
                     - E-mail: {}\n\n\
                     Data/Hora (UTC): {}\n",
                    round.label,
                    number,
                    winner_name.as_deref().unwrap_or("-"),
                    winner_email.as_deref().unwrap_or("-"),
                    closed_at.to_rfc3339(),
                ),
            })
        }
        Notification::PreDrawReminder {
            round: Some(round),
            recipient_email,
        } => Some(OutboundEmail {
            to: recipient_email.clone(),
            to_name: None,
            subject: format!(
                "[{app}] Sorteio começa às 20:00 – Assista ao vivo ({})",
                round.label
            ),
            body: format!(
                "Olá!\n\n\
                 O {} começa hoje às 20:00.\n\
                 Acompanhe ao vivo no canal da Caixa:\n\n\
                 {}\n\n\
                 Boa sorte! 🍀\n\
                 — Equipe {app}\n",
                round.label, ctx.stream_url,
            ),
        }),
        Notification::PreDrawReminder {
            round: None,
            recipient_email,
        } => Some(OutboundEmail {
            to: recipient_email.clone(),
            to_name: None,
            subject: format!("[{app}] Aviso 20:00 – não há sorteio 'open' hoje"),
            body: "Rotina de aviso 20:00 executada, porém não há sorteio com status 'open'.\n\
                   Sem ações.\n"
                .to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notification::RoundRef;
    use crate::domain::round::{Participant, ParticipantId, RoundId, SlotNumber};
    use chrono::{TimeZone, Utc};

    fn ctx() -> TemplateContext {
        TemplateContext {
            app_name: "NewStore Sorteios".into(),
            admin_email: "admin@example.com".into(),
            stream_url: "https://example.com/live".into(),
        }
    }

    fn round_ref() -> RoundRef {
        RoundRef {
            id: RoundId(8),
            label: "Sorteio #8".into(),
        }
    }

    #[test]
    fn test_winner_rendering_is_deterministic() {
        let intent = Notification::Winner {
            round: round_ref(),
            number: SlotNumber::new(17).unwrap(),
            recipient: Participant {
                id: ParticipantId(3),
                name: Some("Ana".into()),
                email: Some("ana@example.com".into()),
            },
        };
        let first = render(&intent, &ctx()).unwrap();
        let second = render(&intent, &ctx()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to, "ana@example.com");
        assert!(first.subject.contains("Sorteio #8"));
        assert!(first.body.contains("Número vencedor: 17"));
        assert!(first.body.contains("Olá, Ana!"));
    }

    #[test]
    fn test_winner_without_email_has_no_message() {
        let intent = Notification::Winner {
            round: round_ref(),
            number: SlotNumber::new(17).unwrap(),
            recipient: Participant {
                id: ParticipantId(3),
                name: Some("Ana".into()),
                email: None,
            },
        };
        assert!(render(&intent, &ctx()).is_none());
    }

    #[test]
    fn test_admin_summary_blank_winner_fields() {
        let intent = Notification::AdminSummary {
            round: round_ref(),
            number: SlotNumber::new(5).unwrap(),
            winner_name: None,
            winner_email: None,
            closed_at: Utc.with_ymd_and_hms(2026, 8, 26, 23, 0, 0).unwrap(),
        };
        let email = render(&intent, &ctx()).unwrap();
        assert_eq!(email.to, "admin@example.com");
        assert!(email.body.contains("- Nome:  -"));
        assert!(email.body.contains("- E-mail: -"));
    }

    #[test]
    fn test_admin_summary_without_admin_address_is_skipped() {
        let mut context = ctx();
        context.admin_email = String::new();
        let intent = Notification::AdminSummary {
            round: round_ref(),
            number: SlotNumber::new(5).unwrap(),
            winner_name: None,
            winner_email: None,
            closed_at: Utc::now(),
        };
        assert!(render(&intent, &context).is_none());
    }

    #[test]
    fn test_reminder_links_the_stream() {
        let intent = Notification::PreDrawReminder {
            round: Some(round_ref()),
            recipient_email: "p@example.com".into(),
        };
        let email = render(&intent, &ctx()).unwrap();
        assert!(email.subject.contains("20:00"));
        assert!(email.body.contains("https://example.com/live"));
    }

    #[test]
    fn test_reminder_without_open_round_uses_operator_notice() {
        let intent = Notification::PreDrawReminder {
            round: None,
            recipient_email: "ops@example.com".into(),
        };
        let email = render(&intent, &ctx()).unwrap();
        assert!(email.subject.contains("não há sorteio"));
    }
}
