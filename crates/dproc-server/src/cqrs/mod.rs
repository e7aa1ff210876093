//! Mediator wiring for feature commands and queries

pub use mediator::DefaultAsyncMediator;

use crate::features::FeatureState;

pub type AppMediator = DefaultAsyncMediator;

pub fn build_mediator(state: FeatureState) -> AppMediator {
    let workflow = state.workflow;
    let uploads = state.uploads;
    let store = workflow.store().clone();

    DefaultAsyncMediator::builder()
        // Invalid records
        .add_handler({
            let workflow = workflow.clone();
            move |cmd| {
                let workflow = workflow.clone();
                async move { crate::features::invalid_records::commands::correct::handle(workflow, cmd).await }
            }
        })
        .add_handler({
            let workflow = workflow.clone();
            move |cmd| {
                let workflow = workflow.clone();
                async move { crate::features::invalid_records::commands::reprocess::handle(workflow, cmd).await }
            }
        })
        .add_handler({
            let workflow = workflow.clone();
            move |cmd| {
                let workflow = workflow.clone();
                async move { crate::features::invalid_records::commands::bulk::handle(workflow, cmd).await }
            }
        })
        .add_handler({
            let workflow = workflow.clone();
            move |cmd| {
                let workflow = workflow.clone();
                async move { crate::features::invalid_records::commands::update_status::handle(workflow, cmd).await }
            }
        })
        .add_handler({
            let workflow = workflow.clone();
            move |cmd| {
                let workflow = workflow.clone();
                async move { crate::features::invalid_records::commands::delete::handle(workflow, cmd).await }
            }
        })
        .add_handler({
            let store = store.clone();
            move |query| {
                let store = store.clone();
                async move { crate::features::invalid_records::queries::get::handle(store, query).await }
            }
        })
        .add_handler({
            let store = store.clone();
            move |query| {
                let store = store.clone();
                async move { crate::features::invalid_records::queries::list::handle(store, query).await }
            }
        })
        .add_handler({
            let store = store.clone();
            move |query| {
                let store = store.clone();
                async move { crate::features::invalid_records::queries::statistics::handle(store, query).await }
            }
        })
        // Uploads
        .add_handler({
            let uploads = uploads.clone();
            move |cmd| {
                let uploads = uploads.clone();
                async move { crate::features::uploads::commands::upload::handle(uploads, cmd).await }
            }
        })
        .add_handler({
            let uploads = uploads.clone();
            move |cmd| {
                let uploads = uploads.clone();
                async move { crate::features::uploads::commands::enqueue::handle(uploads, cmd).await }
            }
        })
        .build()
}
