//! Composite stock reports.
//!
//! Quote, fundamentals and news are fetched as independent tasks under one
//! wall-clock deadline. Sections fail on their own; the report itself is
//! always produced once the request validates.

use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::data_source::{validate_max_items, FundamentalsRequest, NewsRequest, QuoteRequest};
use crate::retry::elapsed_ms;
use crate::service::MarketDataService;
use crate::{
    FailureKind, FetchFailure, FetchOutcome, FundamentalsReport, NewsItem, Quote, Symbol,
    UtcDateTime, ValidationError,
};

/// One section of a [`CompositeReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSection {
    Quote,
    Fundamentals,
    News,
}

impl ReportSection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Fundamentals => "fundamentals",
            Self::News => "news",
        }
    }
}

impl Display for ReportSection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assembled analysis for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeReport {
    pub ticker: Symbol,
    pub stock_name: String,
    pub quote: FetchOutcome<Quote>,
    pub fundamentals: FetchOutcome<FundamentalsReport>,
    /// Absent when news was not requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news: Option<FetchOutcome<Vec<NewsItem>>>,
    pub generated_at: UtcDateTime,
}

impl CompositeReport {
    /// Failed sections paired with their failure, in section order.
    pub fn failures(&self) -> Vec<(ReportSection, &FetchFailure)> {
        let news = self.news.as_ref().and_then(FetchOutcome::as_failure);
        [
            (ReportSection::Quote, self.quote.as_failure()),
            (ReportSection::Fundamentals, self.fundamentals.as_failure()),
            (ReportSection::News, news),
        ]
        .into_iter()
        .filter_map(|(section, failure)| failure.map(|failure| (section, failure)))
        .collect()
    }

    pub fn failed_sections(&self) -> Vec<ReportSection> {
        self.failures()
            .into_iter()
            .map(|(section, _)| section)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failures().is_empty()
    }
}

/// Validated input of [`ReportOrchestrator::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    pub ticker: Symbol,
    pub stock_name: String,
    pub news: Option<NewsRequest>,
}

impl ReportRequest {
    /// The stock name may only be empty when news is not requested;
    /// `max_news` must be in the allowed item range either way.
    pub fn new(
        ticker: &str,
        stock_name: &str,
        include_news: bool,
        max_news: usize,
    ) -> Result<Self, ValidationError> {
        let ticker = Symbol::parse(ticker)?;
        validate_max_items(max_news)?;

        let stock_name = stock_name.trim().to_owned();
        let news = if include_news {
            Some(NewsRequest::new(
                ticker.clone(),
                stock_name.clone(),
                None,
                max_news,
            )?)
        } else {
            None
        };

        Ok(Self {
            ticker,
            stock_name,
            news,
        })
    }
}

/// Fans a report out across the capability services.
#[derive(Clone)]
pub struct ReportOrchestrator {
    service: MarketDataService,
    deadline: Duration,
}

impl ReportOrchestrator {
    /// Uses the deadline from the service settings.
    pub fn new(service: MarketDataService) -> Self {
        let deadline = service.settings().report_deadline();
        Self { service, deadline }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn service(&self) -> &MarketDataService {
        &self.service
    }

    /// Validates the arguments, then builds the report. Validation is the
    /// only error a caller can observe.
    pub async fn build_report(
        &self,
        ticker: &str,
        stock_name: &str,
        include_news: bool,
        max_news: usize,
    ) -> Result<CompositeReport, ValidationError> {
        let request = ReportRequest::new(ticker, stock_name, include_news, max_news)?;
        Ok(self.build(request).await)
    }

    /// Runs every requested branch concurrently. A branch still running at
    /// the deadline is reported as timed out and left to finish detached.
    pub async fn build(&self, request: ReportRequest) -> CompositeReport {
        let started = Instant::now();
        let deadline = started + self.deadline;

        let quote_task = {
            let service = self.service.clone();
            let req = QuoteRequest::new(request.ticker.clone());
            tokio::spawn(async move { service.quote(req).await })
        };
        let fundamentals_task = {
            let service = self.service.clone();
            let req = FundamentalsRequest::new(request.ticker.clone());
            tokio::spawn(async move { service.fundamentals(req).await })
        };
        let news_task = request.news.map(|req| {
            let service = self.service.clone();
            tokio::spawn(async move { service.news(req).await })
        });

        let (quote, fundamentals, news) = tokio::join!(
            settle(ReportSection::Quote, quote_task, deadline, self.deadline),
            settle(ReportSection::Fundamentals, fundamentals_task, deadline, self.deadline),
            async {
                match news_task {
                    Some(task) => Some(settle(ReportSection::News, task, deadline, self.deadline).await),
                    None => None,
                }
            },
        );

        let report = CompositeReport {
            ticker: request.ticker,
            stock_name: request.stock_name,
            quote,
            fundamentals,
            news,
            generated_at: UtcDateTime::now(),
        };

        let failed = report.failed_sections();
        if failed.is_empty() {
            info!(
                symbol = %report.ticker,
                latency_ms = elapsed_ms(started),
                "analysis completed"
            );
        } else {
            warn!(
                symbol = %report.ticker,
                latency_ms = elapsed_ms(started),
                "analysis completed with failures in: {}",
                join_sections(&failed)
            );
        }
        report
    }
}

/// Comma-separated section names.
pub fn join_sections(sections: &[ReportSection]) -> String {
    sections
        .iter()
        .map(|section| section.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

async fn settle<T>(
    section: ReportSection,
    task: JoinHandle<FetchOutcome<T>>,
    deadline: Instant,
    budget: Duration,
) -> FetchOutcome<T> {
    match tokio::time::timeout_at(deadline, task).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(error)) => {
            warn!(section = %section, reason = %error, "report branch aborted");
            FetchOutcome::failure(FetchFailure::new(
                FailureKind::Terminal,
                format!("{section} task failed: {error}"),
            ))
        }
        Err(_) => {
            warn!(
                section = %section,
                deadline_ms = budget.as_millis() as u64,
                "report branch missed the deadline"
            );
            FetchOutcome::failure(FetchFailure::new(
                FailureKind::Timeout,
                format!("{section} did not complete within {} ms", budget.as_millis()),
            ))
        }
    }
}
