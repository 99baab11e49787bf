mod common;

use common::{context, ts, MockServer};
use std::time::Duration;
use tileloop::tiles::loader::TileLoader;
use tileloop::tiles::source::{LayerSource, TileSource};
use tileloop::{LayerSpec, LoopConfig, LoopError, TileCoord};

/// Failed tiles block their URL until the error expires
#[cfg(test)]
mod error_cache_tests {
    use super::*;

    fn tile_url(base_url: &str) -> String {
        LayerSource::new(base_url, LayerSpec::single("radar")).url(TileCoord::new(3, 5, 4), &ts(0))
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_blocks_url_until_expiry() {
        let server = MockServer::new(Duration::from_millis(10));
        server.fail_urls_containing("/4/3/5.png");
        let ctx = context(&server, LoopConfig::default());
        let loader = TileLoader::new(ctx.clone());
        let url = tile_url(ctx.base_url());

        let err = loader.load(url.clone()).await.unwrap_err();
        assert!(matches!(err, LoopError::TileDownloadFailed { .. }));
        assert_eq!(server.tile_calls(), 1);

        // The server recovers, but the error entry still answers
        server.heal();
        tokio::time::sleep(Duration::from_secs(44)).await;
        assert!(loader.load(url.clone()).await.is_err());
        assert_eq!(server.tile_calls(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        let image = loader.load(url).await.expect("retried after expiry");
        assert_eq!(image.dimensions(), (256, 256));
        assert_eq!(server.tile_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_clears_expired_errors() {
        let server = MockServer::new(Duration::from_millis(10));
        server.fail_urls_containing("swarmweb/tile");
        let ctx = context(&server, LoopConfig::default());
        let loader = TileLoader::new(ctx.clone());

        assert!(loader.load(tile_url(ctx.base_url())).await.is_err());
        assert_eq!(ctx.cache().error_count(), 1);

        // First sweep at 30 s: not yet expired
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(ctx.cache().error_count(), 1);

        // Second sweep at 60 s drops it without any lookup
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(ctx.cache().error_count(), 0);
        assert!(ctx.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_expiry() {
        let server = MockServer::new(Duration::from_millis(10));
        server.fail_urls_containing("swarmweb/tile");
        let config = LoopConfig {
            error_expiry_ms: 5_000,
            ..LoopConfig::default()
        };
        let ctx = context(&server, config);
        let loader = TileLoader::new(ctx.clone());
        let url = tile_url(ctx.base_url());

        assert!(loader.load(url.clone()).await.is_err());
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!ctx.cache().contains(&url));
        assert!(loader.load(url).await.is_err());
        assert_eq!(server.tile_calls(), 2);
    }

    #[tokio::test]
    async fn test_cancellation_is_never_cached() {
        let server = MockServer::new(Duration::from_millis(10));
        let ctx = context(&server, LoopConfig::default());

        ctx.cache().insert_error("http://host/tile.png", LoopError::Cancelled);
        assert!(ctx.cache().is_empty());
        assert_eq!(ctx.cache().error_count(), 0);
    }
}
