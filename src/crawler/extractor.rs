//! Course page extraction
//!
//! Turns rendered course HTML into an `ExtractedRecord`. The selectors come
//! from configuration so a page redesign only needs a config change.
//!
//! # Extracted fields
//!
//! | Field             | Shape                               |
//! |-------------------|-------------------------------------|
//! | `title`           | text of the first title match       |
//! | `bio`             | text of the first bio match         |
//! | `objectives`      | text of every objective match       |
//! | `course_content`  | section title -> lecture titles     |
//! | `requirements`    | text of every requirement match     |
//! | `description`     | text of the first description match |
//! | `target_audience` | text of every audience match        |
//!
//! Only the title is mandatory. A page without one is treated as not
//! rendered (blocked, placeholder or error page).

use crate::config::ExtractorConfig;
use crate::shard::{CourseRecord, ExtractedRecord};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

/// Errors from extracting a record out of page HTML
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Invalid CSS selector for {field}: {selector}")]
    InvalidSelector { field: String, selector: String },

    #[error("No course title found on {url}")]
    MissingTitle { url: String },
}

/// Turns page HTML into a record
pub trait RecordExtractor: Send + Sync {
    fn extract(&self, url: &str, html: &str) -> Result<ExtractedRecord, ExtractionError>;
}

/// Extractor for course landing pages
#[derive(Debug)]
pub struct CourseExtractor {
    title: Selector,
    bio: Selector,
    objective: Selector,
    section: Selector,
    section_title: Selector,
    lecture_title: Selector,
    requirement: Selector,
    description: Selector,
    target_audience: Selector,
}

impl CourseExtractor {
    /// Compiles the configured selectors
    pub fn new(config: &ExtractorConfig) -> Result<Self, ExtractionError> {
        let compile = |field: &str, selector: &str| {
            Selector::parse(selector).map_err(|_| ExtractionError::InvalidSelector {
                field: field.to_string(),
                selector: selector.to_string(),
            })
        };

        Ok(Self {
            title: compile("title", &config.title)?,
            bio: compile("bio", &config.bio)?,
            objective: compile("objective", &config.objective)?,
            section: compile("section", &config.section)?,
            section_title: compile("section-title", &config.section_title)?,
            lecture_title: compile("lecture-title", &config.lecture_title)?,
            requirement: compile("requirement", &config.requirement)?,
            description: compile("description", &config.description)?,
            target_audience: compile("target-audience", &config.target_audience)?,
        })
    }
}

impl RecordExtractor for CourseExtractor {
    fn extract(&self, url: &str, html: &str) -> Result<ExtractedRecord, ExtractionError> {
        let document = Html::parse_document(html);

        let title = first_text(&document, &self.title).ok_or_else(|| {
            ExtractionError::MissingTitle {
                url: url.to_string(),
            }
        })?;

        let mut course = CourseRecord::new(url);
        course.title = Some(title);
        course.bio = first_text(&document, &self.bio);
        course.objectives = all_text(&document, &self.objective);
        course.requirements = all_text(&document, &self.requirement);
        course.description = first_text(&document, &self.description);
        course.target_audience = all_text(&document, &self.target_audience);

        for section in document.select(&self.section) {
            let Some(section_title) = section
                .select(&self.section_title)
                .next()
                .map(element_text)
                .filter(|t| !t.is_empty())
            else {
                continue;
            };

            let lectures = section
                .select(&self.lecture_title)
                .map(element_text)
                .filter(|t| !t.is_empty())
                .collect();
            course.push_section(section_title, lectures);
        }

        Ok(course.into())
    }
}

/// Text content of an element with whitespace collapsed
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(element_text)
        .find(|t| !t.is_empty())
}

fn all_text(document: &Html, selector: &Selector) -> Vec<String> {
    document
        .select(selector)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect()
}
