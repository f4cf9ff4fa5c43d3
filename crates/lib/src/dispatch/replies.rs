//! Reply text builders and number/duration formatting.

use crate::data::OccupiedTable;
use chrono::{DateTime, Local};

/// Generic tenant label used when the display-name lookup fails.
pub const GENERIC_TENANT_LABEL: &str = "tu restaurante";

/// Render a whole-peso amount with `.` thousands separators (e.g. 52300 -> "52.300").
pub fn format_amount(amount: i64) -> String {
    let negative = amount < 0;
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    let offset = digits.len() % 3;
    for (i, c) in digits.chars().enumerate() {
        if i != 0 && (i + 3 - offset) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    if negative {
        format!("-{}", out)
    } else {
        out
    }
}

/// Elapsed occupancy, minutes only under an hour, hours+minutes from then on.
pub fn format_elapsed(since: DateTime<Local>, now: DateTime<Local>) -> String {
    let minutes = (now - since).num_minutes().max(0);
    if minutes >= 60 {
        format!("{} h {} min", minutes / 60, minutes % 60)
    } else {
        format!("{} min", minutes)
    }
}

pub fn main_menu(display_name: &str) -> String {
    format!(
        "👋 ¡Hola! Soy el asistente de {}.\n\n\
         A) ¿Cuánto se facturó hoy?\n\
         B) ¿Cuánto se facturó ayer?\n\
         C) ¿Qué mesas están ocupadas?\n\
         D) ¿Quién es el mejor mozo de hoy?\n\n\
         Escribí la letra o la pregunta. Con *ayuda* te muestro los comandos.",
        display_name
    )
}

pub fn help() -> String {
    "🤖 Comandos disponibles:\n\
     • *a* o \"facturó hoy\": total facturado hoy\n\
     • \"facturó ayer\": total facturado ayer\n\
     • *c* o \"mesas ocupadas\": mesas ocupadas ahora\n\
     • \"pedidos activos\": pedidos en curso\n\
     • *d* o \"mozo\": mejor mozo del día\n\
     • *menu*: volver al menú principal"
        .to_string()
}

pub fn billing_today(total: i64, count: usize) -> String {
    format!(
        "📊 Hoy se facturó ${} en {} pedidos.\n¿Querés ver el detalle por mozo? (a: sí / b: no)",
        format_amount(total),
        count
    )
}

pub fn no_sales_today() -> String {
    "📊 Todavía no hay ventas registradas hoy.".to_string()
}

pub fn billing_yesterday(total: i64, count: usize) -> String {
    format!("📊 Ayer se facturó ${} en {} pedidos.", format_amount(total), count)
}

pub fn no_sales_yesterday() -> String {
    "📊 Ayer no se registraron ventas.".to_string()
}

/// Per-staff breakdown, sorted by descending subtotal, ending with the grand
/// total. The sort is stable, so equal subtotals keep first-seen order.
pub fn billing_detail(total: i64, by_staff: &[(String, i64)]) -> String {
    let mut rows: Vec<&(String, i64)> = by_staff.iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1));
    let mut out = String::from("📊 Detalle por mozo:\n");
    for (name, subtotal) in rows {
        out.push_str(&format!("• {}: ${}\n", name, format_amount(*subtotal)));
    }
    out.push_str(&format!("Total: ${}", format_amount(total)));
    out
}

pub fn occupied_tables(count: usize) -> String {
    let noun = if count == 1 { "mesa ocupada" } else { "mesas ocupadas" };
    format!("🍽️ Hay {} {}.\n¿Querés ver el detalle? (a: sí / b: no)", count, noun)
}

pub fn no_occupied_tables() -> String {
    "🍽️ No hay mesas ocupadas en este momento.".to_string()
}

pub fn table_detail(tables: &[OccupiedTable], now: DateTime<Local>) -> String {
    let mut out = String::from("🍽️ Mesas ocupadas:\n");
    for t in tables {
        out.push_str(&format!(
            "• Mesa {}: {}, hace {}\n",
            t.table,
            t.staff_name,
            format_elapsed(t.occupied_since, now)
        ));
    }
    out.trim_end().to_string()
}

pub fn active_orders(count: u64) -> String {
    if count == 0 {
        "🧾 No hay pedidos activos.".to_string()
    } else if count == 1 {
        "🧾 Hay 1 pedido activo.".to_string()
    } else {
        format!("🧾 Hay {} pedidos activos.", count)
    }
}

pub fn top_staff(name: &str, amount: i64) -> String {
    format!("🏆 El mejor mozo de hoy es {} con ${}.", name, format_amount(amount))
}

pub fn no_staff_sales() -> String {
    "🏆 Hoy todavía no hay ventas registradas por mozo.".to_string()
}

pub fn decline_ack() -> String {
    "👍 Listo. Escribí *menu* para volver al menú.".to_string()
}

pub fn not_understood() -> String {
    "🤖 No entiendo ese comando. Escribí *menu* para ver las opciones.".to_string()
}

pub fn handler_error() -> String {
    "⚠️ Ocurrió un error procesando tu consulta. Probá de nuevo en un momento.".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn amount_thousands_separators() {
        assert_eq!(format_amount(0), "0");
        assert_eq!(format_amount(999), "999");
        assert_eq!(format_amount(1000), "1.000");
        assert_eq!(format_amount(52300), "52.300");
        assert_eq!(format_amount(1234567), "1.234.567");
        assert_eq!(format_amount(-4500), "-4.500");
    }

    #[test]
    fn elapsed_minutes_vs_hours() {
        let now = Local.with_ymd_and_hms(2026, 3, 10, 14, 0, 0).unwrap();
        let m45 = Local.with_ymd_and_hms(2026, 3, 10, 13, 15, 0).unwrap();
        let h2m5 = Local.with_ymd_and_hms(2026, 3, 10, 11, 55, 0).unwrap();
        let h1 = Local.with_ymd_and_hms(2026, 3, 10, 13, 0, 0).unwrap();
        assert_eq!(format_elapsed(m45, now), "45 min");
        assert_eq!(format_elapsed(h2m5, now), "2 h 5 min");
        assert_eq!(format_elapsed(h1, now), "1 h 0 min");
        // clock skew never goes negative
        assert_eq!(format_elapsed(now, m45), "0 min");
    }

    #[test]
    fn billing_detail_sorted_descending_with_total() {
        let by_staff = vec![
            ("Ana".to_string(), 1200),
            ("Bruno".to_string(), 4800),
            ("Carla".to_string(), 1200),
        ];
        let text = billing_detail(7200, &by_staff);
        let bruno = text.find("Bruno").unwrap();
        let ana = text.find("Ana").unwrap();
        let carla = text.find("Carla").unwrap();
        assert!(bruno < ana, "highest subtotal first");
        assert!(ana < carla, "ties keep first-seen order");
        assert!(text.ends_with("Total: $7.200"));
    }
}
