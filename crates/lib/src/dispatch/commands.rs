//! Command and resolution-token matching over normalized message text.
//!
//! Top-level commands are an ordered table of (predicate, command) pairs
//! evaluated top-down, first match wins; new commands are table additions.

/// A matched top-level command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    BillingToday,
    BillingYesterday,
    OccupiedTables,
    ActiveOrders,
    TopStaff,
    Help,
}

/// How a user's reply resolves a pending offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Affirm,
    Decline,
    Other,
}

/// Normalize raw message text: trim and lowercase.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// True when the normalized text is a reset-to-menu token. These match the
/// whole message, not substrings, so "hola, ¿facturamos?" is not a reset.
pub fn is_reset(text: &str) -> bool {
    matches!(text, "hola" | "menu" | "menú" | "inicio")
}

fn is_billing_today(t: &str) -> bool {
    t == "a" || (t.contains("factur") && t.contains("hoy"))
}

fn is_billing_yesterday(t: &str) -> bool {
    t.contains("factur") && t.contains("ayer")
}

fn is_occupied_tables(t: &str) -> bool {
    t == "c" || (t.contains("mesa") && t.contains("ocup"))
}

fn is_active_orders(t: &str) -> bool {
    t.contains("pedido") && t.contains("activo")
}

fn is_top_staff(t: &str) -> bool {
    t == "d" || t.contains("mozo")
}

fn is_help(t: &str) -> bool {
    t.contains("ayuda")
}

/// Ordered command table; earlier entries win.
const COMMAND_TABLE: &[(fn(&str) -> bool, Command)] = &[
    (is_billing_today, Command::BillingToday),
    (is_billing_yesterday, Command::BillingYesterday),
    (is_occupied_tables, Command::OccupiedTables),
    (is_active_orders, Command::ActiveOrders),
    (is_top_staff, Command::TopStaff),
    (is_help, Command::Help),
];

/// Match normalized text against the command table. None falls through to the
/// default "command not understood" reply.
pub fn match_command(text: &str) -> Option<Command> {
    COMMAND_TABLE
        .iter()
        .find(|(predicate, _)| predicate(text))
        .map(|(_, command)| *command)
}

/// Classify a reply to a pending offer: `a`/`si`/`sí` (or anything starting
/// with a/s) affirms, `b`/`no` (or anything starting with b/n) declines,
/// everything else is unrecognized. All three consume the context.
pub fn match_resolution(text: &str) -> Resolution {
    match text {
        "a" | "si" | "sí" => return Resolution::Affirm,
        "b" | "no" => return Resolution::Decline,
        _ => {}
    }
    match text.chars().next() {
        Some('a') | Some('s') => Resolution::Affirm,
        Some('b') | Some('n') => Resolution::Decline,
        _ => Resolution::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_tokens_match_whole_message_only() {
        for token in ["hola", "menu", "menú", "inicio"] {
            assert!(is_reset(&normalize(token)), "token {}", token);
        }
        assert!(is_reset(&normalize("  HOLA  ")));
        assert!(!is_reset(&normalize("hola mozo")));
        assert!(!is_reset(&normalize("al inicio")));
    }

    #[test]
    fn billing_today_by_letter_or_keywords() {
        assert_eq!(match_command("a"), Some(Command::BillingToday));
        assert_eq!(
            match_command(&normalize("¿Cuánto se facturó HOY?")),
            Some(Command::BillingToday)
        );
        assert_eq!(
            match_command(&normalize("facturó ayer")),
            Some(Command::BillingYesterday)
        );
    }

    #[test]
    fn today_wins_over_yesterday_when_both_present() {
        // first-match-wins on the ordered table
        assert_eq!(
            match_command(&normalize("facturó hoy y ayer")),
            Some(Command::BillingToday)
        );
    }

    #[test]
    fn tables_orders_staff_help() {
        assert_eq!(match_command("c"), Some(Command::OccupiedTables));
        assert_eq!(
            match_command(&normalize("qué mesas están ocupadas")),
            Some(Command::OccupiedTables)
        );
        assert_eq!(
            match_command(&normalize("pedidos activos")),
            Some(Command::ActiveOrders)
        );
        assert_eq!(match_command("d"), Some(Command::TopStaff));
        assert_eq!(match_command("mejor mozo"), Some(Command::TopStaff));
        assert_eq!(match_command("ayuda"), Some(Command::Help));
    }

    #[test]
    fn letter_b_is_not_a_command() {
        assert_eq!(match_command("b"), None);
        assert_eq!(match_command("cualquier cosa"), None);
    }

    #[test]
    fn resolution_tokens() {
        for affirm in ["a", "si", "sí", "sí, dale", "afirmativo"] {
            assert_eq!(match_resolution(&normalize(affirm)), Resolution::Affirm);
        }
        for decline in ["b", "no", "nah", "bueno no"] {
            assert_eq!(match_resolution(&normalize(decline)), Resolution::Decline);
        }
        assert_eq!(match_resolution("que?"), Resolution::Other);
        assert_eq!(match_resolution(""), Resolution::Other);
    }
}
