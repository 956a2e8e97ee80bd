use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use inyoka_markup::nodes::CellAttrs;
use inyoka_markup::{Node, NodeKind};
use inyoka_storage::Author;

use super::{MacroResult, item_list, page_link};
use crate::behaviors::expand_url;
use crate::context::WikiContext;

const MONTH_NAMES: [&str; 12] = [
    "Januar",
    "Februar",
    "März",
    "April",
    "Mai",
    "Juni",
    "Juli",
    "August",
    "September",
    "Oktober",
    "November",
    "Dezember",
];

/// Latest revisions as a table, one header row per day.
pub(super) fn recent_changes(context: &WikiContext<'_>, per_page: i64) -> MacroResult {
    if context.page().is_none() {
        return Ok(Node::paragraph(vec![Node::text(
            "Letzte Änderungen können von hier aus nicht dargestellt werden.",
        )]));
    }
    let limit = usize::try_from(per_page).unwrap_or(0).max(1);
    let mut rows = Vec::new();
    let mut current_day = None;
    for revision in context.store().recent_revisions(limit)? {
        let day = revision.change_date.date_naive();
        if current_day != Some(day) {
            current_day = Some(day);
            let header = CellAttrs {
                colspan: 4,
                ..CellAttrs::default()
            };
            rows.push(Node::with_children(
                NodeKind::TableRow,
                vec![Node::with_children(
                    NodeKind::TableHeader(header),
                    vec![Node::text(day.format("%d.%m.%Y").to_string())],
                )],
            ));
        }
        let author = match &revision.author {
            Author::User(name) => Node::link(
                expand_url(&context.settings().user_url, name),
                vec![Node::text(name.as_str())],
            ),
            Author::Anonymous(address) => Node::text(address.as_str()),
        };
        let cells = [
            ("timestamp", Node::text(revision.change_date.format("%H:%M").to_string())),
            ("page", page_link(&revision.page, true)),
            ("author", author),
            ("note", Node::text(revision.note.as_str())),
        ];
        rows.push(Node::with_children(
            NodeKind::TableRow,
            cells
                .into_iter()
                .map(|(class, content)| {
                    Node::with_children(NodeKind::TableCell(CellAttrs::default()), vec![content]).with_class(class)
                })
                .collect(),
        ));
    }
    Ok(Node::with_children(NodeKind::Table, rows).with_class("recent_changes"))
}

/// Pages created in the last `months` months, grouped by month, newest
/// first.
pub(super) fn new_pages(context: &WikiContext<'_>, months: i64) -> MacroResult {
    let months = u32::try_from(months.clamp(0, 1200)).unwrap_or(0);
    let cutoff = month_start(context.now(), months);
    let store = context.store();
    let mut created: Vec<(DateTime<Utc>, String)> = Vec::new();
    for name in store.list_pages(None)? {
        if let Some(first) = store.revisions(&name)?.last()
            && first.change_date >= cutoff
        {
            created.push((first.change_date, name));
        }
    }
    created.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let mut children = Vec::new();
    let mut groups: Vec<((i32, u32), Vec<String>)> = Vec::new();
    for (date, name) in created {
        let month = (date.year(), date.month0());
        match groups.last_mut() {
            Some((last, pages)) if *last == month => pages.push(name),
            _ => groups.push((month, vec![name])),
        }
    }
    for ((year, month0), pages) in groups {
        let title = format!("{} {year}", MONTH_NAMES[month0 as usize]);
        children.push(Node::with_children(NodeKind::Headline { level: 3 }, vec![Node::text(title)]));
        children.push(item_list(pages.iter().map(|page| vec![page_link(page, true)])));
    }
    Ok(Node::container(children))
}

/// Midnight of the first day of the month `months` months before `now`.
fn month_start(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|first| first.checked_sub_months(Months::new(months)))
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map_or(DateTime::<Utc>::MIN_UTC, |start| start.and_utc())
}
