pub mod color;
pub mod confirm_delete;
pub mod editor;
pub mod form;
pub mod github_view;
pub mod help;
pub mod review_panel;
pub mod sidebar;
pub mod standup_popup;
pub mod status_bar;
pub mod task_detail;
pub mod task_list;
pub mod toggl_view;
