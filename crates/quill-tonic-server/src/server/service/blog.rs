//! gRPC service implementation for blog CRUD.
//!
//! [`BlogHandler`] implements the generated [`BlogService`] trait on top of a
//! [`RecordStore`]. Unary calls map one-to-one onto store operations;
//! `ListBlogs` is served by a spawned feeder so the store is read at the
//! caller's pace.

use super::{ResponseStream, lifecycle::Lifecycle};
use crate::server::{
    config::ServerConfig,
    store::records::RecordStore,
    streaming::{producer::feed_records, spawn_feeder},
    telemetry::increment_stream_errors,
};
use quill_tonic_core::{
    proto::{Blog, BlogId, blog_service_server::BlogService},
    types::{RecordFields, format_document_id},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

#[derive(Clone)]
pub struct BlogHandler {
    store: RecordStore,
    config: ServerConfig,
    lifecycle: Arc<Lifecycle>,
}

impl BlogHandler {
    pub fn new(store: RecordStore, config: ServerConfig, lifecycle: Arc<Lifecycle>) -> Self {
        Self {
            store,
            config,
            lifecycle,
        }
    }
}

#[tonic::async_trait]
impl BlogService for BlogHandler {
    type ListBlogsStream = ResponseStream<Blog>;

    /// Persists a new blog. Any `id` in the request is ignored; the store
    /// assigns one.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn create_blog(&self, req: Request<Blog>) -> Result<Response<BlogId>, Status> {
        let fields = RecordFields::from(req.into_inner());
        let id = self.store.create(fields).await?;

        Ok(Response::new(BlogId {
            id: format_document_id(&id),
        }))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(id = %req.get_ref().id)))]
    async fn read_blog(&self, req: Request<BlogId>) -> Result<Response<Blog>, Status> {
        let record = self.store.read(&req.into_inner().id).await?;
        Ok(Response::new(Blog::from(record)))
    }

    /// Replaces author, title and content of the blog named by `id`.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(id = %req.get_ref().id)))]
    async fn update_blog(&self, req: Request<Blog>) -> Result<Response<()>, Status> {
        let mut blog = req.into_inner();
        let id = core::mem::take(&mut blog.id);
        self.store.update(&id, RecordFields::from(blog)).await?;
        Ok(Response::new(()))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(id = %req.get_ref().id)))]
    async fn delete_blog(&self, req: Request<BlogId>) -> Result<Response<()>, Status> {
        self.store.delete(&req.into_inner().id).await?;
        Ok(Response::new(()))
    }

    /// Streams every stored blog in creation order.
    ///
    /// An empty store yields an immediately completed stream. A store failure
    /// mid-way ends the stream with an internal status after the blogs already
    /// sent.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn list_blogs(
        &self,
        _req: Request<()>,
    ) -> Result<Response<Self::ListBlogsStream>, Status> {
        let guard = self.lifecycle.begin_stream()?;
        let records = self
            .store
            .list_all()
            .await
            .inspect_err(|_| increment_stream_errors())?;

        let (resp_tx, resp_rx) = mpsc::channel(self.config.stream_buffer_size);
        let token = self.lifecycle.call_token();
        spawn_feeder(resp_tx, guard, move |tx| feed_records(records, tx, token));

        Ok(Response::new(Box::pin(ReceiverStream::new(resp_rx))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::store::{
        local::LocalCollection,
        records::tests::{FaultyCollection, fields},
    };
    use core::time::Duration;
    use tokio_stream::StreamExt;
    use tonic::Code;

    fn handler_with(store: RecordStore) -> BlogHandler {
        BlogHandler::new(
            store,
            ServerConfig::default(),
            Lifecycle::new(Duration::from_secs(1)),
        )
    }

    fn handler() -> BlogHandler {
        handler_with(RecordStore::new(Arc::new(LocalCollection::in_memory())))
    }

    fn blog(id: &str, title: &str) -> Blog {
        let fields = fields(title);
        Blog {
            id: id.to_string(),
            author: fields.author,
            title: fields.title,
            content: fields.content,
        }
    }

    async fn create(handler: &BlogHandler, title: &str) -> String {
        handler
            .create_blog(Request::new(blog("", title)))
            .await
            .unwrap()
            .into_inner()
            .id
    }

    #[tokio::test]
    async fn crud_round_trip() {
        let handler = handler();
        let id = create(&handler, "New Blog").await;

        let read = handler
            .read_blog(Request::new(BlogId { id: id.clone() }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(read, blog(&id, "New Blog"));

        handler
            .update_blog(Request::new(blog(&id, "Update Item")))
            .await
            .unwrap();
        let read = handler
            .read_blog(Request::new(BlogId { id: id.clone() }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(read.title, "Update Item");

        handler
            .delete_blog(Request::new(BlogId { id: id.clone() }))
            .await
            .unwrap();
        let status = handler
            .read_blog(Request::new(BlogId { id: id.clone() }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);
        assert!(status.message().contains(&id));
    }

    #[tokio::test]
    async fn empty_id_is_invalid_argument_everywhere() {
        let handler = handler();

        let read = handler
            .read_blog(Request::new(BlogId::default()))
            .await
            .unwrap_err();
        let update = handler
            .update_blog(Request::new(blog("", "x")))
            .await
            .unwrap_err();
        let delete = handler
            .delete_blog(Request::new(BlogId::default()))
            .await
            .unwrap_err();

        for status in [read, update, delete] {
            assert_eq!(status.code(), Code::InvalidArgument);
        }
    }

    #[tokio::test]
    async fn list_blogs_streams_everything() {
        let handler = handler();
        let empty: Vec<_> = handler
            .list_blogs(Request::new(()))
            .await
            .unwrap()
            .into_inner()
            .collect()
            .await;
        assert!(empty.is_empty());

        let mut ids = Vec::new();
        for title in ["a", "b", "c"] {
            ids.push(create(&handler, title).await);
        }

        let listed: Vec<_> = handler
            .list_blogs(Request::new(()))
            .await
            .unwrap()
            .into_inner()
            .map(|r| r.unwrap().id)
            .collect()
            .await;
        assert_eq!(listed, ids);
    }

    #[tokio::test]
    async fn list_blogs_surfaces_mid_stream_failure() {
        let handler = handler_with(RecordStore::new(Arc::new(FaultyCollection {
            fail_list_after: Some(1),
            ..Default::default()
        })));

        let items: Vec<_> = handler
            .list_blogs(Request::new(()))
            .await
            .unwrap()
            .into_inner()
            .collect()
            .await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert_eq!(items[1].as_ref().unwrap_err().code(), Code::Internal);
    }

    #[tokio::test]
    async fn store_failure_on_create_is_internal() {
        let handler = handler_with(RecordStore::new(Arc::new(FaultyCollection {
            broken: true,
            ..Default::default()
        })));

        let status = handler
            .create_blog(Request::new(blog("", "x")))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Internal);
    }
}
