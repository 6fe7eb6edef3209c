//! `confwatch data-ids` — one page of data ids in a group, or all of them.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use confwatch_core::{Group, PageResult};

use super::{namespace_id, print_json, Session, DEFAULT_GROUP};

#[derive(Args, Debug)]
pub struct DataIdsArgs {
    /// Namespace id; omit for the public namespace.
    #[arg(long, short = 'n', default_value = "")]
    pub namespace: String,

    #[arg(long, short = 'g', default_value = DEFAULT_GROUP)]
    pub group: String,

    /// Data id to look up; a substring with --fuzzy.
    #[arg(default_value = "")]
    pub search: String,

    /// Substring match instead of exact match.
    #[arg(long)]
    pub fuzzy: bool,

    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Page size; defaults to the settings file value.
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Collect every page instead of printing one.
    #[arg(long, conflicts_with_all = ["search", "fuzzy", "page"])]
    pub all: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct DataIdRow {
    #[tabled(rename = "data id")]
    data_id: String,
    #[tabled(rename = "group")]
    group: String,
    #[tabled(rename = "type")]
    content_type: String,
    #[tabled(rename = "app")]
    app_name: String,
}

#[derive(Serialize)]
struct PageJson<'a> {
    page: u32,
    pages_available: u32,
    total: u64,
    data_ids: Vec<&'a str>,
}

impl DataIdsArgs {
    pub fn run(self, session: &Session) -> Result<()> {
        let namespace = namespace_id(&self.namespace);
        let group = Group::from(self.group.trim());
        let client = session.client();

        if self.all {
            let ids = client
                .list_all_data_ids(&namespace, &group)
                .with_context(|| format!("failed to list data ids in {namespace}/{group}"))?;
            if self.json {
                return print_json(&ids);
            }
            for id in ids {
                println!("{id}");
            }
            return Ok(());
        }

        let page_size = self.page_size.unwrap_or(session.settings.page_size);
        if page_size == 0 {
            anyhow::bail!("--page-size must be at least 1");
        }
        let page = client
            .list_data_ids(
                &namespace,
                &group,
                &self.search,
                self.fuzzy,
                self.page,
                page_size,
            )
            .with_context(|| format!("failed to list data ids in {namespace}/{group}"))?;

        if self.json {
            return print_json(&page_json(&page));
        }
        print_page(page);
        Ok(())
    }
}

fn page_json(page: &PageResult) -> PageJson<'_> {
    PageJson {
        page: page.page_number,
        pages_available: page.pages_available,
        total: page.total_count,
        data_ids: page.page_items.iter().map(|i| i.data_id.as_str()).collect(),
    }
}

fn print_page(page: PageResult) {
    let footer = format!(
        "page {}/{} | {} total",
        page.page_number, page.pages_available, page.total_count
    );
    if page.page_items.is_empty() {
        println!("No matching data ids.");
        println!("{}", footer.bright_black());
        return;
    }

    let rows: Vec<DataIdRow> = page
        .page_items
        .into_iter()
        .map(|item| DataIdRow {
            data_id: item.data_id,
            group: item.group,
            content_type: item.content_type.unwrap_or_default(),
            app_name: item.app_name.unwrap_or_default(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!("{}", footer.bright_black());
}
