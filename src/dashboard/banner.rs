// src/dashboard/banner.rs
use crate::config::EnrichConfig;
use crate::model::CatalogItem;

/// Number of today-anime entries featured in the banner.
pub const BANNER_ANIME: usize = 1;

pub struct BannerInput<'a> {
    pub loading: bool,
    pub movies: &'a [CatalogItem],
    pub tv_shows: &'a [CatalogItem],
    pub variety_shows: &'a [CatalogItem],
    pub short_dramas: &'a [CatalogItem],
    pub today_anime: &'a [CatalogItem],
}

/// Hero carousel: the leading items of each row, in row order.
///
/// Empty while loading, and empty when every list row is empty (the schedule
/// alone never fills the banner).
pub fn compose(input: &BannerInput<'_>, leads: &EnrichConfig) -> Vec<CatalogItem> {
    let any_rows = !(input.movies.is_empty()
        && input.tv_shows.is_empty()
        && input.variety_shows.is_empty()
        && input.short_dramas.is_empty());
    if input.loading || !any_rows {
        return Vec::new();
    }

    input
        .movies
        .iter()
        .take(leads.movies)
        .chain(input.tv_shows.iter().take(leads.tv_shows))
        .chain(input.variety_shows.iter().take(leads.variety_shows))
        .chain(input.short_dramas.iter().take(leads.short_dramas))
        .chain(input.today_anime.iter().take(BANNER_ANIME))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceKind;

    fn many(kind: SourceKind, n: usize) -> Vec<CatalogItem> {
        (0..n)
            .map(|i| CatalogItem::new(kind, format!("{}-{i}", kind.as_str()), "t"))
            .collect()
    }

    #[test]
    fn takes_leading_items_per_row() {
        let movies = many(SourceKind::Movie, 5);
        let tv = many(SourceKind::Tv, 5);
        let variety = many(SourceKind::Variety, 5);
        let dramas = many(SourceKind::ShortDrama, 5);
        let anime = many(SourceKind::Anime, 3);
        let out = compose(
            &BannerInput {
                loading: false,
                movies: &movies,
                tv_shows: &tv,
                variety_shows: &variety,
                short_dramas: &dramas,
                today_anime: &anime,
            },
            &EnrichConfig::default(),
        );
        let ids: Vec<_> = out.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(
            ids,
            [
                "movie-0",
                "movie-1",
                "tv-0",
                "tv-1",
                "variety-0",
                "short_drama-0",
                "short_drama-1",
                "anime-0"
            ]
        );
    }

    #[test]
    fn empty_while_loading_or_without_rows() {
        let anime = many(SourceKind::Anime, 1);
        let movies = many(SourceKind::Movie, 1);
        let base = BannerInput {
            loading: false,
            movies: &[],
            tv_shows: &[],
            variety_shows: &[],
            short_dramas: &[],
            today_anime: &anime,
        };
        assert!(compose(&base, &EnrichConfig::default()).is_empty());

        let loading = BannerInput {
            loading: true,
            movies: &movies,
            ..base
        };
        assert!(compose(&loading, &EnrichConfig::default()).is_empty());
    }
}
