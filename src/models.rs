use serde::{Deserialize, Deserializer, Serialize};

/// Decodes `null` as the type's zero value, the way TMDB payloads are consumed
/// upstream. Missing keys are covered by `#[serde(default)]`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Genre {
    #[serde(deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductionCompany {
    #[serde(deserialize_with = "null_as_default")]
    pub id: i64,
    pub logo_path: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub origin_country: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductionCountry {
    #[serde(deserialize_with = "null_as_default")]
    pub iso_3166_1: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpokenLanguage {
    #[serde(deserialize_with = "null_as_default")]
    pub english_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub iso_639_1: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
}

/// TMDB movie details. Stored in the cache as a single JSON blob keyed by `id`.
///
/// Every field is optional on the wire: discover results omit most detail fields
/// and TMDB sends `null` for missing artwork.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Movie {
    #[serde(deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub original_title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub original_language: String,
    #[serde(deserialize_with = "null_as_default")]
    pub overview: String,
    #[serde(deserialize_with = "null_as_default")]
    pub release_date: String,
    #[serde(deserialize_with = "null_as_default")]
    pub runtime: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub vote_average: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub vote_count: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub popularity: f64,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub genres: Vec<Genre>,
    #[serde(deserialize_with = "null_as_default")]
    pub genre_ids: Vec<i64>,
    #[serde(deserialize_with = "null_as_default")]
    pub production_companies: Vec<ProductionCompany>,
    #[serde(deserialize_with = "null_as_default")]
    pub production_countries: Vec<ProductionCountry>,
    #[serde(deserialize_with = "null_as_default")]
    pub spoken_languages: Vec<SpokenLanguage>,
    #[serde(deserialize_with = "null_as_default")]
    pub budget: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub revenue: i64,
    pub homepage: Option<String>,
    pub imdb_id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub tagline: String,
    #[serde(deserialize_with = "null_as_default")]
    pub video: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub adult: bool,
}

impl Movie {
    pub fn cache_key(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovieList {
    #[serde(deserialize_with = "null_as_default")]
    pub page: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub results: Vec<Movie>,
    #[serde(deserialize_with = "null_as_default")]
    pub total_pages: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub total_results: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub message: String,
}
