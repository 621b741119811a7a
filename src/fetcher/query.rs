//! Filter sets and per-endpoint query builders
//!
//! The FAC API follows the PostgREST convention `field=operator.value`:
//!
//! | Filter             | Query value        |
//! |--------------------|--------------------|
//! | equality           | `eq.value`         |
//! | substring (no case)| `ilike.*value*`    |
//! | set membership     | `in.(v1,v2,...)`   |
//!
//! A column projection is sent as `select=a,b,c`. Builders are pure: they
//! never touch the network and fail only on arguments the API cannot express.

use std::collections::BTreeMap;

use crate::fetcher::{FetcherError, FetcherResult};

/// A comparison expression for one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `eq.value`
    Eq(String),
    /// `ilike.*value*`
    ILike(String),
    /// `in.(v1,v2,...)`
    In(Vec<String>),
}

impl Filter {
    /// Render as a query parameter value
    pub fn to_param_value(&self) -> String {
        match self {
            Filter::Eq(v) => format!("eq.{v}"),
            Filter::ILike(v) => format!("ilike.*{v}*"),
            Filter::In(values) => format!("in.({})", values.join(",")),
        }
    }
}

/// Field filters plus an optional column projection for one request
///
/// Filters are keyed by field name; inserting a second filter for the same
/// field replaces the first. Iteration order is by field name, so two sets
/// built from the same arguments are structurally equal and render the same
/// query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    select: Option<Vec<String>>,
    filters: BTreeMap<String, Filter>,
}

impl FilterSet {
    /// Empty filter set (matches every row)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality filter
    pub fn eq(mut self, field: impl Into<String>, value: impl ToString) -> Self {
        self.filters.insert(field.into(), Filter::Eq(value.to_string()));
        self
    }

    /// Add a case-insensitive substring filter
    pub fn ilike(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field.into(), Filter::ILike(value.into()));
        self
    }

    /// Add a set-membership filter
    ///
    /// # Errors
    /// Returns [`FetcherError::InvalidArgument`] for an empty value list.
    pub fn within<I, S>(mut self, field: impl Into<String>, values: I) -> FetcherResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let field = field.into();
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(FetcherError::InvalidArgument(format!(
                "membership filter on '{field}' needs at least one value"
            )));
        }
        self.filters.insert(field, Filter::In(values));
        Ok(self)
    }

    /// Project the response onto the given columns
    ///
    /// # Errors
    /// Returns [`FetcherError::InvalidArgument`] for an empty list, a blank
    /// column name, or a name containing a comma.
    pub fn select<I, S>(mut self, columns: I) -> FetcherResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns
            .into_iter()
            .map(|c| c.into().trim().to_string())
            .collect();
        if columns.is_empty() {
            return Err(FetcherError::InvalidArgument(
                "column list cannot be empty".to_string(),
            ));
        }
        if let Some(bad) = columns.iter().find(|c| c.is_empty() || c.contains(',')) {
            return Err(FetcherError::InvalidArgument(format!(
                "invalid column name '{bad}'"
            )));
        }
        self.select = Some(columns);
        Ok(self)
    }

    /// Filter attached to `field`, if any
    pub fn get(&self, field: &str) -> Option<&Filter> {
        self.filters.get(field)
    }

    /// Projected columns, if any
    pub fn columns(&self) -> Option<&[String]> {
        self.select.as_deref()
    }

    /// Number of field filters (the projection is not counted)
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// True when no field filter is present
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Render as `(name, value)` query parameters; `select` first
    pub fn to_query_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(self.filters.len() + 1);
        if let Some(columns) = &self.select {
            params.push(("select".to_string(), columns.join(",")));
        }
        params.extend(
            self.filters
                .iter()
                .map(|(field, filter)| (field.clone(), filter.to_param_value())),
        );
        params
    }
}

/// Optional filters for the `general` endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneralQuery {
    /// Column projection
    pub columns: Option<Vec<String>>,
    /// Report id (equality)
    pub report_id: Option<String>,
    /// Auditee UEI (equality)
    pub auditee_uei: Option<String>,
    /// Auditee EIN (equality)
    pub auditee_ein: Option<String>,
    /// Auditee name (case-insensitive substring)
    pub auditee_name: Option<String>,
    /// Auditee city (equality)
    pub auditee_city: Option<String>,
    /// Auditee state; trimmed and upper-cased before use
    pub auditee_state: Option<String>,
    /// Audit year (equality)
    pub audit_year: Option<i32>,
}

impl GeneralQuery {
    /// Empty query
    pub fn new() -> Self {
        Self::default()
    }

    /// Project onto `columns`
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Filter by report id
    pub fn report_id(mut self, report_id: impl Into<String>) -> Self {
        self.report_id = Some(report_id.into());
        self
    }

    /// Filter by auditee UEI
    pub fn auditee_uei(mut self, uei: impl Into<String>) -> Self {
        self.auditee_uei = Some(uei.into());
        self
    }

    /// Filter by auditee EIN
    pub fn auditee_ein(mut self, ein: impl Into<String>) -> Self {
        self.auditee_ein = Some(ein.into());
        self
    }

    /// Filter by auditee name substring
    pub fn auditee_name(mut self, name: impl Into<String>) -> Self {
        self.auditee_name = Some(name.into());
        self
    }

    /// Filter by auditee city
    pub fn auditee_city(mut self, city: impl Into<String>) -> Self {
        self.auditee_city = Some(city.into());
        self
    }

    /// Filter by auditee state abbreviation
    pub fn auditee_state(mut self, state: impl Into<String>) -> Self {
        self.auditee_state = Some(state.into());
        self
    }

    /// Filter by audit year
    pub fn audit_year(mut self, year: i32) -> Self {
        self.audit_year = Some(year);
        self
    }

    /// Translate into a [`FilterSet`]
    pub fn build(&self) -> FetcherResult<FilterSet> {
        let mut set = FilterSet::new();
        if let Some(columns) = &self.columns {
            set = set.select(columns.iter().cloned())?;
        }
        if let Some(v) = &self.report_id {
            set = set.eq("report_id", v);
        }
        if let Some(v) = &self.auditee_uei {
            set = set.eq("auditee_uei", v);
        }
        if let Some(v) = &self.auditee_ein {
            set = set.eq("auditee_ein", v);
        }
        if let Some(v) = &self.auditee_name {
            set = set.ilike("auditee_name", v.as_str());
        }
        if let Some(v) = &self.auditee_city {
            set = set.eq("auditee_city", v);
        }
        if let Some(v) = &self.auditee_state {
            set = set.eq("auditee_state", v.trim().to_uppercase());
        }
        if let Some(v) = self.audit_year {
            set = set.eq("audit_year", v);
        }
        Ok(set)
    }
}

/// Optional filters for the `federal_awards` endpoint
///
/// Every supplied filter is kept: the server ANDs them together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FederalAwardsQuery {
    /// Column projection
    pub columns: Option<Vec<String>>,
    /// Report id (equality)
    pub report_id: Option<String>,
    /// First two digits of the assistance listing number (equality)
    pub federal_agency_prefix: Option<String>,
    /// Remaining digits of the assistance listing number (equality);
    /// requires `federal_agency_prefix`
    pub federal_award_extension: Option<String>,
    /// Additional award identification (case-insensitive substring)
    pub additional_award_identification: Option<String>,
    /// Program name (case-insensitive substring)
    pub federal_program_name: Option<String>,
    /// Cluster name (case-insensitive substring)
    pub cluster_name: Option<String>,
}

impl FederalAwardsQuery {
    /// Empty query
    pub fn new() -> Self {
        Self::default()
    }

    /// Project onto `columns`
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Filter by report id
    pub fn report_id(mut self, report_id: impl Into<String>) -> Self {
        self.report_id = Some(report_id.into());
        self
    }

    /// Filter by agency prefix
    pub fn federal_agency_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.federal_agency_prefix = Some(prefix.into());
        self
    }

    /// Filter by award extension
    pub fn federal_award_extension(mut self, extension: impl Into<String>) -> Self {
        self.federal_award_extension = Some(extension.into());
        self
    }

    /// Filter by additional award identification substring
    pub fn additional_award_identification(mut self, id: impl Into<String>) -> Self {
        self.additional_award_identification = Some(id.into());
        self
    }

    /// Filter by program name substring
    pub fn federal_program_name(mut self, name: impl Into<String>) -> Self {
        self.federal_program_name = Some(name.into());
        self
    }

    /// Filter by cluster name substring
    pub fn cluster_name(mut self, name: impl Into<String>) -> Self {
        self.cluster_name = Some(name.into());
        self
    }

    /// Translate into a [`FilterSet`]
    ///
    /// # Errors
    /// [`FetcherError::InvalidArgument`] when an award extension is given
    /// without an agency prefix, or the column list is invalid.
    pub fn build(&self) -> FetcherResult<FilterSet> {
        if self.federal_award_extension.is_some() && self.federal_agency_prefix.is_none() {
            return Err(FetcherError::InvalidArgument(
                "federal_award_extension requires federal_agency_prefix".to_string(),
            ));
        }

        let mut set = FilterSet::new();
        if let Some(columns) = &self.columns {
            set = set.select(columns.iter().cloned())?;
        }
        if let Some(v) = &self.report_id {
            set = set.eq("report_id", v);
        }
        if let Some(v) = &self.federal_agency_prefix {
            set = set.eq("federal_agency_prefix", v);
        }
        if let Some(v) = &self.federal_award_extension {
            set = set.eq("federal_award_extension", v);
        }
        if let Some(v) = &self.additional_award_identification {
            set = set.ilike("additional_award_identification", v.as_str());
        }
        if let Some(v) = &self.federal_program_name {
            set = set.ilike("federal_program_name", v.as_str());
        }
        if let Some(v) = &self.cluster_name {
            set = set.ilike("cluster_name", v.as_str());
        }
        Ok(set)
    }
}

/// Membership filter on `report_id` for one batch of foreign keys
pub fn report_id_batch(report_ids: &[String]) -> FetcherResult<FilterSet> {
    FilterSet::new().within("report_id", report_ids.iter().cloned())
}
