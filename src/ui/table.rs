use tabled::{settings::Style, Table, Tabled};
use crate::storage::{ApiToken, DbStats};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Table")]
    pub metric: String,
    #[tabled(rename = "Rows")]
    pub value: String,
}

#[derive(Tabled)]
struct TokenRow {
    #[tabled(rename = "Id")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Created")]
    created_at: String,
    #[tabled(rename = "Last used")]
    last_used_at: String,
    #[tabled(rename = "Status")]
    status: &'static str,
}

pub fn stats_table(stats: &DbStats) -> String {
    let rows = [
        ("counties", stats.counties),
        ("places", stats.places),
        ("postal_codes", stats.postal_codes),
        ("api_tokens (active)", stats.active_tokens),
    ]
    .into_iter()
    .map(|(metric, value)| TableRow { metric: metric.to_string(), value: value.to_string() });

    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn tokens_table(tokens: &[ApiToken]) -> String {
    if tokens.is_empty() {
        return String::new();
    }

    let rows = tokens.iter().map(|t| TokenRow {
        id: t.id,
        name: t.name.clone(),
        created_at: t.created_at.clone(),
        last_used_at: t.last_used_at.clone().unwrap_or_else(|| "never".to_string()),
        status: if t.revoked { "revoked" } else { "active" },
    });

    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_table_lists_every_table() {
        let table = stats_table(&DbStats { counties: 2, places: 5, postal_codes: 9, active_tokens: 1 });
        assert!(table.contains("postal_codes"));
        assert!(table.contains('9'));
    }

    #[test]
    fn test_tokens_table_marks_revoked() {
        assert!(tokens_table(&[]).is_empty());
        let token = ApiToken {
            id: 1,
            name: "ci".into(),
            created_at: "2026-01-01 00:00:00".into(),
            last_used_at: None,
            revoked: true,
        };
        let table = tokens_table(&[token]);
        assert!(table.contains("revoked"));
        assert!(table.contains("never"));
    }
}
