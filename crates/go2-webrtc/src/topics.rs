// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Robot data-channel topics.

/// Compressed voxel map (binary frames).
pub const ULIDAR_ARRAY: &str = "rt/utlidar/voxel_map_compressed";
pub const ULIDAR: &str = "rt/utlidar/voxel_map";
pub const ULIDAR_STATE: &str = "rt/utlidar/lidar_state";
/// Lidar on/off switch.
pub const ULIDAR_SWITCH: &str = "rt/utlidar/switch";
/// Robot pose (odometry).
pub const ROBOTODOM: &str = "rt/utlidar/robot_pose";
/// Low-frequency sport-mode state.
pub const LF_SPORT_MOD_STATE: &str = "rt/lf/sportmodestate";
pub const SPORT_MOD_STATE: &str = "rt/sportmodestate";
/// Low-frequency low-level state (motors).
pub const LOW_STATE: &str = "rt/lf/lowstate";
pub const MULTIPLE_STATE: &str = "rt/multiplestate";
/// Sport API requests.
pub const SPORT_MOD: &str = "rt/api/sport/request";
/// Obstacle-avoidance API requests.
pub const OBSTACLE_AVOID: &str = "rt/api/obstacles_avoid/request";

