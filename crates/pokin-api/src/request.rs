use reqwest::Url;

use crate::error::ApiError;
use crate::model::NodePayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// What the envelope's `data` is decoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Themes,
    Tree,
    Forest,
    Counts,
    Empty,
}

/// A call against the `/pohon-kinerja` resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiRequest {
    /// `GET /pohon-kinerja/tematik[/:tahun]`
    ListThemes { fiscal_year: Option<i32> },
    /// `GET /pohon-kinerja/:id`
    FetchTree { id: i64 },
    /// `GET /pohon-kinerja/opd/:kodeOpd/:tahun`
    FetchOpdForest { org_code: String, fiscal_year: i32 },
    /// `GET /pohon-kinerja/count?kodeOpd=&tahun=`
    CountByLevel { org_code: String, fiscal_year: i32 },
    /// `POST /pohon-kinerja`
    CreateNode(NodePayload),
    /// `PUT /pohon-kinerja/:id`
    UpdateNode { id: i64, payload: NodePayload },
    /// `DELETE /pohon-kinerja/:id`
    DeleteNode { id: i64 },
}

impl ApiRequest {
    pub fn method(&self) -> HttpMethod {
        match self {
            ApiRequest::ListThemes { .. }
            | ApiRequest::FetchTree { .. }
            | ApiRequest::FetchOpdForest { .. }
            | ApiRequest::CountByLevel { .. } => HttpMethod::Get,
            ApiRequest::CreateNode(_) => HttpMethod::Post,
            ApiRequest::UpdateNode { .. } => HttpMethod::Put,
            ApiRequest::DeleteNode { .. } => HttpMethod::Delete,
        }
    }

    pub fn response_kind(&self) -> ResponseKind {
        match self {
            ApiRequest::ListThemes { .. } => ResponseKind::Themes,
            ApiRequest::FetchTree { .. } => ResponseKind::Tree,
            ApiRequest::FetchOpdForest { .. } => ResponseKind::Forest,
            ApiRequest::CountByLevel { .. } => ResponseKind::Counts,
            ApiRequest::CreateNode(_)
            | ApiRequest::UpdateNode { .. }
            | ApiRequest::DeleteNode { .. } => ResponseKind::Empty,
        }
    }

    pub fn body(&self) -> Option<&NodePayload> {
        match self {
            ApiRequest::CreateNode(payload) | ApiRequest::UpdateNode { payload, .. } => {
                Some(payload)
            }
            _ => None,
        }
    }

    pub fn is_mutation(&self) -> bool {
        self.method() != HttpMethod::Get
    }

    /// Resolve against the configured base URL. A base path such as
    /// `https://host/api` is kept; segments are percent-encoded.
    pub fn url(&self, base: &Url) -> Result<Url, ApiError> {
        let mut url = base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ApiError::Url(format!("{base} cannot be used as a base URL")))?;
            segments.pop_if_empty().push("pohon-kinerja");

            match self {
                ApiRequest::ListThemes { fiscal_year } => {
                    segments.push("tematik");
                    if let Some(year) = fiscal_year {
                        segments.push(&year.to_string());
                    }
                }
                ApiRequest::FetchTree { id }
                | ApiRequest::UpdateNode { id, .. }
                | ApiRequest::DeleteNode { id } => {
                    segments.push(&id.to_string());
                }
                ApiRequest::FetchOpdForest {
                    org_code,
                    fiscal_year,
                } => {
                    segments
                        .push("opd")
                        .push(org_code)
                        .push(&fiscal_year.to_string());
                }
                ApiRequest::CountByLevel { .. } => {
                    segments.push("count");
                }
                ApiRequest::CreateNode(_) => {}
            }
        }

        if let ApiRequest::CountByLevel {
            org_code,
            fiscal_year,
        } = self
        {
            url.query_pairs_mut()
                .append_pair("kodeOpd", org_code)
                .append_pair("tahun", &fiscal_year.to_string());
        }

        Ok(url)
    }
}
