// src/parser/html.rs

//! Catalog markup adapter.
//!
//! Pulls listing rows and program detail blocks out of catalog pages with
//! `scraper` and hands the detail blocks to the section classifier.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ProgramDetail, ProgramListing, RequiredUnits};
use crate::parser::classifier::{Block, SectionClassifier};
use crate::parser::text::{parse_number, parse_units_range, safe_text, split_ge_patterns};
use crate::utils::resolve_url;

const LISTING_ROW: &str = "#scrollTable table tbody tr";
const DETAIL_ROOT: &str = "#faqOne";
const REQUIRED_UNITS_MARKER: &str = "Required courses:";

/// Selectors used on catalog pages, parsed once per parser.
#[derive(Debug)]
pub struct CatalogSelectors {
    listing_row: Selector,
    row_header: Selector,
    cell: Selector,
    link: Selector,
    detail_root: Selector,
    paragraph: Selector,
    strong: Selector,
    outcome_list: Selector,
    list_item: Selector,
    block_row: Selector,
    unit_column: Selector,
    course_link: Selector,
    course_column: Selector,
}

impl CatalogSelectors {
    pub fn new() -> Result<Self> {
        Ok(Self {
            listing_row: parse_selector(LISTING_ROW)?,
            row_header: parse_selector(r#"th[scope="row"]"#)?,
            cell: parse_selector("td")?,
            link: parse_selector("a")?,
            detail_root: parse_selector(DETAIL_ROOT)?,
            paragraph: parse_selector("p")?,
            strong: parse_selector("strong")?,
            outcome_list: parse_selector("ul.dots")?,
            list_item: parse_selector("li")?,
            block_row: parse_selector("div.row")?,
            unit_column: parse_selector(".col-md-2")?,
            course_link: parse_selector("a.classLinks")?,
            course_column: parse_selector(r#"div[class*="col-md-"]"#)?,
        })
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Collapse the text of an element into one clean line.
fn text_of(element: ElementRef<'_>) -> String {
    let pieces: Vec<&str> = element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    safe_text(&pieces.join(" "))
}

/// Parser for the catalog's listing and detail pages.
#[derive(Debug)]
pub struct CatalogParser {
    selectors: CatalogSelectors,
}

impl CatalogParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            selectors: CatalogSelectors::new()?,
        })
    }

    /// Rows of the program listing table.
    ///
    /// Rows without a row header or with fewer than four cells are skipped.
    /// The type and department come from the first two cells and the code
    /// from the last one.
    pub fn parse_listing(&self, html: &str, base_url: &Url) -> Vec<ProgramListing> {
        let document = Html::parse_document(html);
        let sel = &self.selectors;

        let mut programs = Vec::new();
        for row in document.select(&sel.listing_row) {
            let Some(header) = row.select(&sel.row_header).next() else {
                continue;
            };
            let cells: Vec<ElementRef<'_>> = row.select(&sel.cell).collect();
            if cells.len() < 4 {
                log::debug!("Skipping listing row with {} cells", cells.len());
                continue;
            }

            let anchor = header.select(&sel.link).next();
            let name = text_of(anchor.unwrap_or(header));
            let original_info_url = anchor
                .and_then(|a| a.value().attr("href"))
                .map(|href| resolve_url(base_url, href));

            programs.push(ProgramListing {
                name,
                program_type: text_of(cells[0]),
                department: text_of(cells[1]),
                program_code: text_of(cells[cells.len() - 1]),
                original_info_url,
            });
        }
        programs
    }

    /// Requirement structure of one program page.
    ///
    /// A page without the detail container yields an empty detail.
    pub fn parse_detail(&self, html: &str) -> ProgramDetail {
        let document = Html::parse_document(html);
        let sel = &self.selectors;

        let Some(root) = document.select(&sel.detail_root).next() else {
            log::debug!("No detail container found");
            return ProgramDetail::default();
        };

        let (program_goal, ge_patterns) = match root.select(&sel.paragraph).next() {
            Some(p) => (
                self.after_label(p, "Program Goal:")
                    .filter(|goal| !goal.is_empty()),
                self.after_label(p, "GE Pattern(s):")
                    .map(|ge| split_ge_patterns(&ge))
                    .unwrap_or_default(),
            ),
            None => (None, Vec::new()),
        };

        let program_learning_outcomes = root
            .select(&sel.outcome_list)
            .next()
            .map(|ul| {
                ul.select(&sel.list_item)
                    .map(text_of)
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let rows: Vec<ElementRef<'_>> = root.select(&sel.block_row).collect();
        let required_units = self.required_units(&rows);
        let blocks: Vec<Block> = rows.iter().map(|row| self.block(*row)).collect();
        let classified = SectionClassifier::classify(&blocks);

        ProgramDetail {
            program_goal,
            ge_patterns,
            program_learning_outcomes,
            required_units,
            sections: classified.sections,
            cross_list_rules: classified.cross_list_rules,
        }
    }

    /// Text following a `<strong>` label up to the next `<br>`.
    fn after_label(&self, block: ElementRef<'_>, label: &str) -> Option<String> {
        let wanted = label.trim_end_matches(':');
        let strong = block
            .select(&self.selectors.strong)
            .find(|s| text_of(*s).trim_end_matches(':') == wanted)?;

        let mut pieces = Vec::new();
        for sibling in strong.next_siblings() {
            if let Some(element) = sibling.value().as_element() {
                if element.name() == "br" {
                    break;
                }
            }
            if let Some(text) = sibling.value().as_text() {
                pieces.push(text.trim().to_string());
            } else if let Some(element) = ElementRef::wrap(sibling) {
                pieces.push(text_of(element));
            }
        }
        Some(safe_text(&pieces.join(" ")))
    }

    /// Units from the right-hand column of the first "Required courses:" row.
    fn required_units(&self, rows: &[ElementRef<'_>]) -> RequiredUnits {
        let Some(row) = rows
            .iter()
            .find(|row| text_of(**row).contains(REQUIRED_UNITS_MARKER))
        else {
            return RequiredUnits::default();
        };

        let unit_text = row
            .select(&self.selectors.unit_column)
            .last()
            .map(text_of)
            .unwrap_or_else(|| text_of(*row));
        let (min, max) = parse_units_range(&unit_text);
        RequiredUnits { min, max }
    }

    /// A course-link row becomes a course block; anything else is text.
    fn block(&self, row: ElementRef<'_>) -> Block {
        let Some(link) = row.select(&self.selectors.course_link).next() else {
            return Block::Text(text_of(row));
        };

        let columns: Vec<ElementRef<'_>> = link.select(&self.selectors.course_column).collect();
        let code = columns.first().map(|c| text_of(*c)).unwrap_or_default();
        let units = columns.last().and_then(|c| parse_number(&text_of(*c)));
        Block::Course { code, units }
    }
}
