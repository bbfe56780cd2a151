//! Lineage view wired to the REST client, against a mock catalog server

use std::sync::Arc;

use catalog_interfaces::{AddLineage, EntityReference, EntityType, LineageDirection, LineageError};
use catalog_lineage::{
    create_lineage_api, CurrentUser, LineageClientConfig, LineageHandlers, LineageView, LoadOutcome,
    RemoteCatalogClient, RemoteCatalogClientConfig, SessionContext,
};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> LineageClientConfig {
    LineageClientConfig {
        api_url: format!("{}/api/v1", server.uri()),
        timeout_secs: 5,
        ..LineageClientConfig::default()
    }
}

#[tokio::test]
async fn root_and_node_expansion_over_http() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let root = Uuid::new_v4();
    let child = Uuid::new_v4();
    let grandchild = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/api/v1/lineage/table/name/mysql.shop.public.orders"))
        .and(query_param("downstreamDepth", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entity": { "id": root, "type": "table", "fullyQualifiedName": "mysql.shop.public.orders" },
            "nodes": [ { "id": child, "type": "table", "fullyQualifiedName": "mysql.shop.public.order_items" } ],
            "upstreamEdges": [],
            "downstreamEdges": [ { "fromEntity": root, "toEntity": child } ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/lineage/table/name/mysql.shop.public.order_items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entity": { "id": child, "type": "table", "fullyQualifiedName": "mysql.shop.public.order_items" },
            "nodes": [
                { "id": root, "type": "table" },
                { "id": grandchild, "type": "dashboard", "displayName": "Revenue" }
            ],
            "upstreamEdges": [ { "fromEntity": root, "toEntity": child } ],
            "downstreamEdges": [ { "fromEntity": child, "toEntity": grandchild } ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = create_lineage_api("remote", &config_for(&server))?;
    let view = LineageView::new(api, SessionContext::new());

    view.load_root(EntityType::Table, "mysql.shop.public.orders").await?;
    let child_ref = EntityReference::new(child, EntityType::Table).with_fqn("mysql.shop.public.order_items");
    let outcome = view.load_node(&child_ref, LineageDirection::To).await?;
    assert!(matches!(outcome, LoadOutcome::Applied(merge) if merge.nodes_added == 1 && merge.edges_added == 1));

    let graph = view.graph().await;
    assert_eq!(graph.edge_count(), 2);
    assert_eq!(graph.node(grandchild).map(|n| n.label()), Some("Revenue".to_string()));
    assert!(graph.upstream_edges().is_empty());
    Ok(())
}

#[tokio::test]
async fn server_error_surfaces_and_allows_retry() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let node = EntityReference::new(Uuid::new_v4(), EntityType::Pipeline);

    Mock::given(method("GET"))
        .and(path(format!("/api/v1/lineage/pipeline/{}", node.id)))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "code": 500, "message": "search index unavailable" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/lineage/pipeline/{}", node.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "entity": { "id": node.id, "type": "pipeline" } })))
        .mount(&server)
        .await;

    let client = RemoteCatalogClient::new(RemoteCatalogClientConfig {
        api_url: format!("{}/api/v1", server.uri()),
        timeout_secs: 5,
        auth_token: None,
    })?;
    let view = LineageView::new(Arc::new(client), SessionContext::new());
    view.reset(Some(node.clone())).await;

    let err = view.load_node(&node, LineageDirection::From).await.unwrap_err();
    assert_eq!(
        err,
        LineageError::Server { status: 500, message: "search index unavailable".to_string() }
    );

    view.load_node(&node, LineageDirection::From).await?;
    assert_eq!(view.leaf_nodes().await.upstream(), &[node.id]);
    Ok(())
}

#[tokio::test]
async fn backend_refusal_of_admin_edit_is_not_applied() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let from = EntityReference::new(Uuid::new_v4(), EntityType::Table);
    let to = EntityReference::new(Uuid::new_v4(), EntityType::Topic);

    Mock::given(method("PUT"))
        .and(path("/api/v1/lineage"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "message": "principal is not allowed" })))
        .expect(1)
        .mount(&server)
        .await;

    let session = SessionContext::new();
    session.login(CurrentUser::admin("admin"), Default::default());
    let view = LineageView::new(create_lineage_api("remote", &config_for(&server))?, session);
    view.reset(Some(from.clone())).await;

    let err = view.add_lineage(AddLineage::new(from.clone(), to.clone())).await.unwrap_err();
    assert!(matches!(err, LineageError::AccessDenied(_)));
    assert!(!view.graph().await.contains_node(to.id));
    Ok(())
}
