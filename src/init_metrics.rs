pub(super) fn init_metrics() {
    describe_toplevel();
    describe_ingest();
    describe_cleanup();
    describe_process();
}

fn describe_toplevel() {
    metrics::describe_counter!(
        THUMBNAILS,
        "How many thumbnails have been uploaded to vid-rs"
    );
    metrics::describe_counter!(
        SIGNED_URLS,
        "How many signed video links vid-rs has handed out"
    );
}

pub(crate) const THUMBNAILS: &str = "vid-rs.thumbnails";
pub(crate) const SIGNED_URLS: &str = "vid-rs.signed-urls";

fn describe_ingest() {
    metrics::describe_histogram!(
        INGEST_VIDEO,
        "Timings for classifying, remuxing, and storing uploaded videos"
    );
    metrics::describe_counter!(
        INGEST_END,
        "How many video ingestions have finished, successfully or not"
    );
    metrics::describe_counter!(
        UPLOADS,
        "How many remuxed videos have been written to the store, by orientation"
    );
    metrics::describe_counter!(
        ORPHANED_OBJECTS,
        "How many stored videos were left without a record after persisting their key failed"
    );
}

pub(crate) const INGEST_VIDEO: &str = "vid-rs.ingest.video";
pub(crate) const INGEST_END: &str = "vid-rs.ingest.end";
pub(crate) const UPLOADS: &str = "vid-rs.ingest.uploads";
pub(crate) const ORPHANED_OBJECTS: &str = "vid-rs.ingest.orphaned-objects";

fn describe_cleanup() {
    metrics::describe_counter!(
        CLEANUP_FAILURE,
        "How many scratch files vid-rs failed to remove"
    );
}

pub(crate) const CLEANUP_FAILURE: &str = "vid-rs.cleanup.failure";

fn describe_process() {
    metrics::describe_counter!(
        PROCESS_START,
        "How many times vid-rs has spawned a background process"
    );
    metrics::describe_histogram!(
        PROCESS_DURATION,
        "Timings for all background processes"
    );
    metrics::describe_counter!(
        PROCESS_END,
        "How many background processes have completed"
    );
}

pub(crate) const PROCESS_START: &str = "vid-rs.process.start";
pub(crate) const PROCESS_DURATION: &str = "vid-rs.process.duration";
pub(crate) const PROCESS_END: &str = "vid-rs.process.end";
