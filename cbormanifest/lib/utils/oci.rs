//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The file that marks a directory as an OCI image layout.
pub const OCI_LAYOUT_FILENAME: &str = "oci-layout";

/// The image index at the root of an OCI image layout.
pub const OCI_INDEX_FILENAME: &str = "index.json";

/// The directory holding content-addressed blobs in an OCI image layout.
pub const OCI_BLOBS_SUBDIR: &str = "blobs";

/// The annotation naming a manifest inside an image index.
pub const OCI_REF_NAME_ANNOTATION: &str = "org.opencontainers.image.ref.name";

/// Media type of an uncompressed OCI layer.
pub const OCI_LAYER_TAR_MEDIA_TYPE: &str = "application/vnd.oci.image.layer.v1.tar";

/// Media type of a gzip-compressed OCI layer.
pub const OCI_LAYER_TAR_GZIP_MEDIA_TYPE: &str = "application/vnd.oci.image.layer.v1.tar+gzip";

/// Media type of a gzip-compressed Docker v2 layer.
pub const DOCKER_LAYER_TAR_GZIP_MEDIA_TYPE: &str =
    "application/vnd.docker.image.rootfs.diff.tar.gzip";

/// Prefix of a path segment that marks a deletion in a layer.
pub const WHITEOUT_PREFIX: &str = ".wh.";

/// The path segment that hides every earlier entry of its directory.
pub const WHITEOUT_OPAQUE: &str = ".wh..wh..opq";
