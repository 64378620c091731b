pub mod auto_zoom;
