use std::time::Duration;

use lazy_static::lazy_static;
use reqwest::{header::USER_AGENT, StatusCode, Url};
use scraper::{ElementRef, Html, Selector};

use crate::{
    config::{Config, ConfigError},
    fetcher::{FetchError, PageFetcher, PageOutcome},
    Card,
};

const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// HTTP session against the card listing. Pages are `<base_url>?page=<n>`.
pub struct ShoobFetcher {
    client: Option<reqwest::Client>,
    base_url: Url,
    user_agent: String,
    max_retries: u32,
}

enum Attempt {
    Done(Result<PageOutcome, FetchError>),
    Retry(String),
}

impl ShoobFetcher {
    pub fn connect(config: &Config) -> Result<Self, ConfigError> {
        let base_url = config.base_url()?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ConfigError::Invalid(format!("http client: {e}")))?;
        tracing::debug!(%base_url, "opened session");
        Ok(Self {
            client: Some(client),
            base_url,
            user_agent: config.user_agent.clone(),
            max_retries: config.max_retries,
        })
    }

    fn page_url(&self, page: u32) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair("page", &page.to_string());
        url
    }

    async fn attempt(&self, client: &reqwest::Client, page: u32) -> Attempt {
        let response = match client
            .get(self.page_url(page))
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Attempt::Retry(e.to_string()),
        };

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Attempt::Done(Err(FetchError::Fatal {
                    page,
                    reason: format!("site refused access ({status})"),
                }))
            }
            StatusCode::NOT_FOUND => return Attempt::Done(Ok(PageOutcome::EndOfData)),
            s if s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error() => {
                return Attempt::Retry(format!("server answered {status}"))
            }
            s if !s.is_success() => {
                return Attempt::Done(Err(FetchError::Transient {
                    page,
                    reason: format!("unexpected status {status}"),
                }))
            }
            _ => {}
        }

        match response.text().await {
            Ok(body) => Attempt::Done(Ok(PageOutcome::Cards(parse_body(&body)))),
            Err(e) => Attempt::Retry(e.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl PageFetcher for ShoobFetcher {
    async fn fetch(&mut self, page: u32) -> Result<PageOutcome, FetchError> {
        let Some(client) = &self.client else {
            return Err(FetchError::Fatal {
                page,
                reason: "session already closed".into(),
            });
        };

        let mut attempt = 0;
        loop {
            let reason = match self.attempt(client, page).await {
                Attempt::Done(result) => return result,
                Attempt::Retry(reason) => reason,
            };
            if attempt >= self.max_retries {
                return Err(FetchError::Transient { page, reason });
            }
            attempt += 1;
            tracing::debug!(page, attempt, %reason, "retrying page");
            tokio::time::sleep(RETRY_BACKOFF * attempt).await;
        }
    }

    async fn close(&mut self) {
        if self.client.take().is_some() {
            tracing::debug!("closed session");
        }
    }
}

fn parse_body(body: &str) -> Vec<Card> {
    let doc = Html::parse_document(body);
    parse_document(&doc).collect()
}

pub fn parse_document(doc: &'_ Html) -> impl Iterator<Item = Card> + '_ {
    lazy_static! {
        static ref CARD: Selector = Selector::parse(".card-item").unwrap();
    };
    doc.select(&CARD).filter_map(parse_card)
}

fn parse_card(card: ElementRef<'_>) -> Option<Card> {
    lazy_static! {
        static ref NAME: Selector = Selector::parse(".card-name").unwrap();
        static ref TIER: Selector = Selector::parse(".card-tier").unwrap();
        static ref SERIES: Selector = Selector::parse(".card-series").unwrap();
    };
    /*
     * <div class="card-item">
     *   <span class="card-name">Rem</span>
     *   <span class="card-tier">Tier 3</span>
     *   <span class="card-series">Re:Zero</span>
     * </div>
     */
    let text = |sel: &Selector| {
        let text = card.select(sel).next()?.text().collect::<String>();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_owned())
    };
    let name = text(&NAME)?;
    let tier = text(&TIER)?;
    let series = text(&SERIES)?;

    let tier = match (tier.get(..4), tier.get(4..)) {
        (Some(label), Some(rest))
            if label.eq_ignore_ascii_case("tier")
                && rest.chars().next().map_or(true, char::is_whitespace) =>
        {
            rest.trim().to_owned()
        }
        _ => tier,
    };
    if tier.is_empty() {
        return None;
    }
    Some(Card { name, tier, series })
}

#[cfg(test)]
mod test {
    use super::*;

    macro_rules! test_page_parser {
        ($($test:ident : $html:expr => [$(($name:expr, $tier:expr, $series:expr)),* $(,)?])*) => {
            $(paste::paste! {
                #[test]
                fn [<parse_ $test>]() {
                    let got = parse_body($html);
                    let expected: Vec<Card> = vec![$(Card::new($name, $tier, $series)),*];
                    assert_eq!(got, expected);
                }
            })*
        };
    }

    test_page_parser! {
        single_card: r#"
            <div class="card-item">
              <span class="card-name">Rem</span>
              <span class="card-tier">Tier 3</span>
              <span class="card-series">Re:Zero</span>
            </div>"# => [("Rem", "3", "Re:Zero")]
        several_cards_keep_page_order: r#"
            <main>
              <a class="card-item" href="/c/1">
                <div class="card-name"> Megumin </div>
                <div class="card-tier">tier S</div>
                <div class="card-series">Konosuba</div>
              </a>
              <a class="card-item" href="/c/2">
                <div class="card-name">Aqua</div>
                <div class="card-tier">6</div>
                <div class="card-series">Konosuba</div>
              </a>
            </main>"# => [("Megumin", "S", "Konosuba"), ("Aqua", "6", "Konosuba")]
        nested_markup_is_flattened: r#"
            <div class="card-item">
              <p class="card-name"><b>Asuna</b> Yuuki</p>
              <p class="card-tier">Tier <i>2</i></p>
              <p class="card-series">Sword Art Online</p>
            </div>"# => [("Asuna Yuuki", "2", "Sword Art Online")]
        incomplete_cards_are_skipped: r#"
            <div class="card-item">
              <span class="card-name">No Tier</span>
              <span class="card-series">Somewhere</span>
            </div>
            <div class="card-item">
              <span class="card-name"></span>
              <span class="card-tier">1</span>
              <span class="card-series">Blank</span>
            </div>
            <div class="card-item">
              <span class="card-name">Kept</span>
              <span class="card-tier">1</span>
              <span class="card-series">Here</span>
            </div>"# => [("Kept", "1", "Here")]
        tier_words_are_not_labels: r#"
            <div class="card-item">
              <span class="card-name">Gaia</span>
              <span class="card-tier">Tierra</span>
              <span class="card-series">Mythos</span>
            </div>
            <div class="card-item">
              <span class="card-name">Bare</span>
              <span class="card-tier">Tier</span>
              <span class="card-series">Mythos</span>
            </div>"# => [("Gaia", "Tierra", "Mythos")]
        page_without_cards: r#"<p>No cards found</p>"# => []
    }

    #[test]
    fn page_number_goes_in_the_query() {
        let config = Config {
            base_url: "https://shoob.gg/cards?sort=name".into(),
            ..Default::default()
        };
        let fetcher = ShoobFetcher::connect(&config).unwrap();
        assert_eq!(
            fetcher.page_url(4).as_str(),
            "https://shoob.gg/cards?sort=name&page=4"
        );
    }

    #[tokio::test]
    async fn closed_session_refuses_to_fetch() {
        let mut fetcher = ShoobFetcher::connect(&Config::default()).unwrap();
        fetcher.close().await;
        let err = fetcher.fetch(1).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
