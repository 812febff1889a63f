//! Identity mapping - Mappatura tra identità esterne e id interni
//!
//! Gli id utente interni sono stringhe opache. Le identità numeriche
//! esterne vengono mappate con un prefisso di ruolo a 4 caratteri
//! (`u___` per gli utenti, `ag__` per gli agent). Gli id conversazione
//! sono derivati, mai forniti dal client.

use crate::core::error::ChatError;
use crate::core::consts::{GROUP_CONVERSATION_PREFIX, SINGLE_CONVERSATION_PREFIX};

const PREFIX_LEN: usize = 4;
const USER_PREFIX: &str = "u___";
const AGENT_PREFIX: &str = "ag__";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
    User,
    Agent,
}

/// Identità esterna (numerica + ruolo) che mappa a un id utente interno.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub role: ActorRole,
}

impl Actor {
    /// `Actor { id: 42, role: User }` => `"u___42"`
    pub fn to_im_user_id(&self) -> String {
        match self.role {
            ActorRole::User => format!("{}{}", USER_PREFIX, self.id),
            ActorRole::Agent => format!("{}{}", AGENT_PREFIX, self.id),
        }
    }

    /// Parse inverso: da id interno a identità esterna.
    /// Fallisce su prefisso sconosciuto o parte numerica non valida.
    pub fn from_im_user_id(user_id: &str) -> Result<Actor, ChatError> {
        if user_id.len() < PREFIX_LEN + 1 {
            return Err(ChatError::invalid_param()
                .with_details(format!("invalid user id: {:?}", user_id)));
        }
        let (prefix, id_str) = user_id.split_at(PREFIX_LEN);
        let role = match prefix {
            USER_PREFIX => ActorRole::User,
            AGENT_PREFIX => ActorRole::Agent,
            _ => {
                return Err(ChatError::invalid_param()
                    .with_details(format!("unknown prefix: {:?}", prefix)));
            }
        };
        let id: i64 = id_str.parse().map_err(|_| {
            ChatError::invalid_param().with_details(format!("invalid id: {:?}", id_str))
        })?;
        Ok(Actor { id, role })
    }
}

pub fn role_from_str(role: &str) -> Option<ActorRole> {
    match role {
        "user" => Some(ActorRole::User),
        "agent" => Some(ActorRole::Agent),
        _ => None,
    }
}

/// Id conversazione per chat singola: `si_{min}:{max}` con i due
/// partecipanti ordinati lessicograficamente. Il separatore è ":"
/// perché gli user id possono contenere "_".
pub fn single_conversation_id(user_a: &str, user_b: &str) -> String {
    let (lo, hi) = if user_a <= user_b {
        (user_a, user_b)
    } else {
        (user_b, user_a)
    };
    format!("{}{}:{}", SINGLE_CONVERSATION_PREFIX, lo, hi)
}

/// Id conversazione per chat di gruppo: `sg_{groupId}`.
pub fn group_conversation_id(group_id: &str) -> String {
    format!("{}{}", GROUP_CONVERSATION_PREFIX, group_id)
}

pub fn is_single_conversation(conversation_id: &str) -> bool {
    conversation_id.len() > 3 && conversation_id.starts_with(SINGLE_CONVERSATION_PREFIX)
}

pub fn is_group_conversation(conversation_id: &str) -> bool {
    conversation_id.len() > 3 && conversation_id.starts_with(GROUP_CONVERSATION_PREFIX)
}

/// Estrae i due partecipanti da un id di chat singola.
pub fn single_chat_peers(conversation_id: &str) -> Option<(&str, &str)> {
    if !is_single_conversation(conversation_id) {
        return None;
    }
    let participants = &conversation_id[SINGLE_CONVERSATION_PREFIX.len()..];
    let idx = participants.find(':')?;
    Some((&participants[..idx], &participants[idx + 1..]))
}

/// True se `user_id` è uno dei due partecipanti della chat singola.
pub fn is_single_chat_participant(conversation_id: &str, user_id: &str) -> bool {
    match single_chat_peers(conversation_id) {
        Some((a, b)) => a == user_id || b == user_id,
        None => false,
    }
}

/// Estrae il group id da un id di conversazione di gruppo.
pub fn group_id_of(conversation_id: &str) -> Option<&str> {
    if !is_group_conversation(conversation_id) {
        return None;
    }
    Some(&conversation_id[GROUP_CONVERSATION_PREFIX.len()..])
}
