//! End-to-end deployment tests.

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;
    use sitestack_deploy::DeployError;

    use crate::{cleanup_bucket, list_keys, reconciler, s3_client, test_target, write_tree};

    const SPA: &[(&str, &str)] = &[
        ("index.html", "<html><body><div id=\"app\"></div></body></html>"),
        ("assets/app.js", "document.getElementById('app').textContent = 'hi';"),
    ];

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_deploy_site_to_new_bucket() {
        let client = s3_client();
        let target = test_target("e2e");
        let bucket = target.bucket().as_str();
        let dir = tempfile::tempdir().expect("tempdir");
        write_tree(dir.path(), SPA);

        let report = reconciler(&client)
            .run(&target, dir.path())
            .await
            .expect("deploy");
        assert!(report.bucket_created);

        assert_eq!(list_keys(&client, bucket).await, vec!["assets/app.js", "index.html"]);

        let html = client
            .get_object()
            .bucket(bucket)
            .key("index.html")
            .send()
            .await
            .expect("get index.html");
        assert_eq!(html.content_type(), Some("text/html"));
        assert_eq!(html.content_encoding(), None);

        let website = client
            .get_bucket_website()
            .bucket(bucket)
            .send()
            .await
            .expect("get_bucket_website");
        assert_eq!(website.index_document().map(|d| d.suffix()), Some("index.html"));
        assert_eq!(website.error_document().map(|d| d.key()), Some("index.html"));

        let policy = client
            .get_bucket_policy()
            .bucket(bucket)
            .send()
            .await
            .expect("get_bucket_policy");
        let policy: serde_json::Value =
            serde_json::from_str(policy.policy().expect("policy body")).expect("policy json");
        assert_eq!(policy["Statement"][0]["Action"], "s3:GetObject");
        assert_eq!(
            policy["Statement"][0]["Resource"],
            format!("arn:aws:s3:::{bucket}/*")
        );

        cleanup_bucket(&client, bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_leave_no_stale_keys_on_redeploy() {
        let client = s3_client();
        let target = test_target("redeploy");
        let bucket = target.bucket().as_str();

        let first = tempfile::tempdir().expect("tempdir");
        write_tree(
            first.path(),
            &[("index.html", "v1"), ("old/page.html", "gone"), ("assets/v1.js", "v1")],
        );
        reconciler(&client)
            .run(&target, first.path())
            .await
            .expect("first deploy");

        let second = tempfile::tempdir().expect("tempdir");
        write_tree(second.path(), SPA);
        let report = reconciler(&client)
            .run(&target, second.path())
            .await
            .expect("second deploy");

        assert!(!report.bucket_created);
        assert_eq!(report.purged, 3);
        assert_eq!(list_keys(&client, bucket).await, vec!["assets/app.js", "index.html"]);

        cleanup_bucket(&client, bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_serve_gzip_encoded_objects() {
        let client = s3_client();
        let target = test_target("gzip");
        let bucket = target.bucket().as_str();
        let dir = tempfile::tempdir().expect("tempdir");
        write_tree(dir.path(), SPA);

        let report = reconciler(&client)
            .with_gzip(true)
            .run(&target, dir.path())
            .await
            .expect("deploy");
        assert_eq!(report.compressed, 2);

        let js = client
            .get_object()
            .bucket(bucket)
            .key("assets/app.js")
            .send()
            .await
            .expect("get app.js");
        assert_eq!(js.content_encoding(), Some("gzip"));
        let body = js.body.collect().await.expect("read body").into_bytes();

        let mut decoded = String::new();
        GzDecoder::new(&body[..])
            .read_to_string(&mut decoded)
            .expect("gunzip");
        assert_eq!(decoded, SPA[1].1);

        cleanup_bucket(&client, bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_clean_up_buckets_with_more_than_one_page() {
        let client = s3_client();
        let target = test_target("pages");
        let bucket = target.bucket().as_str();
        let dir = tempfile::tempdir().expect("tempdir");
        let files: Vec<(String, String)> = (0..1_100)
            .map(|i| (format!("pages/{i:04}.html"), format!("page {i}")))
            .collect();
        let files: Vec<(&str, &str)> = files.iter().map(|(k, b)| (k.as_str(), b.as_str())).collect();
        write_tree(dir.path(), &files);

        reconciler(&client)
            .run(&target, dir.path())
            .await
            .expect("deploy");
        assert_eq!(list_keys(&client, bucket).await.len(), 1_100);

        cleanup_bucket(&client, bucket).await;

        let head = client.head_bucket().bucket(bucket).send().await;
        assert!(head.is_err(), "bucket must be deleted after cleanup");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_fail_fast_on_missing_dist_folder() {
        let client = s3_client();
        let target = test_target("missing");

        let err = reconciler(&client)
            .run(&target, std::path::Path::new("/nonexistent/site/.spa"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::MissingDistFolder(_)));

        let head = client
            .head_bucket()
            .bucket(target.bucket().as_str())
            .send()
            .await;
        assert!(head.is_err(), "bucket must not be created");
    }
}
