//! On-device face detection for camera frame processors.
//!
//! A host hands each camera frame to the `detectFaces` plugin, which adapts
//! the buffer, letterboxes it into a BlazeFace tensor, runs ONNX inference and
//! decodes the output back into frame-pixel boxes.

pub mod shared {
    pub mod constants;
    pub mod error;
    pub mod frame;
    pub mod geometry;
}

pub mod preprocessing {
    pub mod domain {
        pub mod frame_adapter;
        pub mod letterbox;
        pub mod normalized_image;
        pub mod transform_matrix;
    }
}

pub mod detection {
    pub mod domain {
        pub mod decoder;
        pub mod detection_candidate;
        pub mod inference_backend;
        pub mod inference_engine;
        pub mod raw_output;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod detect_faces_use_case;
    pub mod pipeline_logger;
}

pub mod plugin {
    pub mod detect_options;
    pub mod face_detection_plugin;
    pub mod frame_processor_plugin;
    pub mod frame_throttle;
    pub mod plugin_config;
    pub mod registry;
}

pub mod capture {
    pub mod auto_capture_detector;
}
