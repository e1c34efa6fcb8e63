//! LibXML2 FFI Wrapper Module
//!
//! Safe wrappers around the parts of libxml2 the validation stages need:
//! well-formedness parsing of a document, schema compilation and schema
//! validation of an already-parsed document.
//!
//! ## Why libxml2
//!
//! No mature pure Rust crate validates against XML Schema (XSD). Parsers such
//! as `roxmltree` or `quick-xml` stop at well-formedness, so libxml2 is used
//! for both the syntax stage and the schema stage. Using the same parser for
//! both keeps the two stages in agreement on what "well-formed" means.
//!
//! ## Encoding handling
//!
//! Documents are parsed with no encoding override. libxml2 honours the byte
//! order mark and the declaration, so a document whose bytes contradict its
//! declaration fails here instead of being silently re-decoded.
//!
//! ## Thread Safety Strategy
//!
//! - **Initialization**: `xmlInitParser` runs exactly once behind [`Once`].
//! - **Schema parsing**: NOT thread-safe in libxml2; schemas are compiled once
//!   while settings are built and then shared read-only.
//! - **Document parsing and validation**: each call owns its own parser or
//!   validation context, so calls on different documents run in parallel.

use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::{Arc, Once};

use libc::{c_char, c_int, c_uchar, c_void};

use crate::error::{LibXml2Error, LibXml2Result, ParseError};

/// Global initialization flag for libxml2
///
/// libxml2's initialization functions are NOT thread-safe, so they are
/// guarded by `std::sync::Once`.
static LIBXML2_INIT: Once = Once::new();

/// Suppress error output on stderr
const XML_PARSE_NOERROR: c_int = 1 << 5;
/// Suppress warning output on stderr
const XML_PARSE_NOWARNING: c_int = 1 << 6;
/// Forbid network access while loading
const XML_PARSE_NONET: c_int = 1 << 11;

const DOCUMENT_PARSE_OPTIONS: c_int = XML_PARSE_NOERROR | XML_PARSE_NOWARNING | XML_PARSE_NONET;

// Opaque libxml2 structures
#[repr(C)]
pub struct XmlSchema {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaParserCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaValidCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlParserCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlDoc {
    _private: [u8; 0],
}

/// Leading fields of libxml2's `xmlNode`; only ever read through a pointer.
#[repr(C)]
pub struct XmlNode {
    _private: *mut c_void,
    _type: c_int,
    name: *const c_uchar,
}

// External libxml2 FFI declarations
#[cfg_attr(target_os = "windows", link(name = "libxml2"))]
#[cfg_attr(not(target_os = "windows"), link(name = "xml2"))]
unsafe extern "C" {
    pub fn xmlInitParser();
    pub fn xmlInitGlobals();

    // Document parsing
    pub fn xmlNewParserCtxt() -> *mut XmlParserCtxt;
    pub fn xmlFreeParserCtxt(ctxt: *mut XmlParserCtxt);
    pub fn xmlCtxtReadMemory(
        ctxt: *mut XmlParserCtxt,
        buffer: *const c_char,
        size: c_int,
        url: *const c_char,
        encoding: *const c_char,
        options: c_int,
    ) -> *mut XmlDoc;
    pub fn xmlCtxtGetLastError(ctx: *mut c_void) -> *const xmlError;
    pub fn xmlFreeDoc(doc: *mut XmlDoc);
    pub fn xmlDocGetRootElement(doc: *const XmlDoc) -> *mut XmlNode;

    // Schema parsing
    pub fn xmlSchemaNewMemParserCtxt(
        buffer: *const c_char,
        size: c_int,
    ) -> *mut XmlSchemaParserCtxt;
    pub fn xmlSchemaNewParserCtxt(url: *const c_char) -> *mut XmlSchemaParserCtxt;
    pub fn xmlSchemaSetParserStructuredErrors(
        ctxt: *mut XmlSchemaParserCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchemaParse(ctxt: *const XmlSchemaParserCtxt) -> *mut XmlSchema;
    pub fn xmlSchemaFreeParserCtxt(ctxt: *mut XmlSchemaParserCtxt);
    pub fn xmlSchemaFree(schema: *mut XmlSchema);

    // Schema validation
    pub fn xmlSchemaNewValidCtxt(schema: *const XmlSchema) -> *mut XmlSchemaValidCtxt;
    pub fn xmlSchemaFreeValidCtxt(ctxt: *mut XmlSchemaValidCtxt);
    pub fn xmlSchemaValidateDoc(ctxt: *mut XmlSchemaValidCtxt, doc: *mut XmlDoc) -> c_int;
    pub fn xmlSchemaSetValidStructuredErrors(
        ctxt: *mut XmlSchemaValidCtxt,
        sherr: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
}

#[repr(C)]
pub struct xmlError {
    pub domain: c_int,
    pub code: c_int,
    pub message: *const c_char,
    pub level: c_int,
    pub file: *const c_char,
    pub line: c_int,
    pub str1: *const c_char,
    pub str2: *const c_char,
    pub str3: *const c_char,
    pub int1: c_int,
    pub int2: c_int,
    pub ctxt: *mut c_void,
    pub node: *mut c_void,
}

pub type XmlStructuredErrorFunc =
    Option<unsafe extern "C" fn(user_data: *mut c_void, error: *mut xmlError)>;

/// Collects each structured error message into the `Vec<String>` behind `user_data`
unsafe extern "C" fn structured_error_callback(user_data: *mut c_void, error: *mut xmlError) {
    let errors = unsafe { &mut *(user_data as *mut Vec<String>) };

    if !error.is_null() {
        let msg_ptr = unsafe { (*error).message };
        if !msg_ptr.is_null() {
            let c_str = unsafe { CStr::from_ptr(msg_ptr) };
            errors.push(c_str.to_string_lossy().trim().to_string());
        }
    }
}

fn path_to_cstring(path: &Path) -> LibXml2Result<CString> {
    path.to_str()
        .and_then(|s| CString::new(s).ok())
        .ok_or_else(|| LibXml2Error::InvalidPath {
            path: path.to_path_buf(),
        })
}

/// Thread-safe handle to a compiled schema, freed when the last clone drops
#[derive(Debug, Clone)]
pub struct XmlSchemaPtr {
    inner: Arc<XmlSchemaInner>,
}

#[derive(Debug)]
struct XmlSchemaInner {
    ptr: *mut XmlSchema,
    _phantom: PhantomData<XmlSchema>,
}

// Safety: compiled xmlSchema structures are read-only during validation
unsafe impl Send for XmlSchemaInner {}
unsafe impl Sync for XmlSchemaInner {}

impl XmlSchemaPtr {
    /// # Safety
    ///
    /// `ptr` must come from `xmlSchemaParse` and must not be freed elsewhere.
    pub(crate) unsafe fn from_raw(ptr: *mut XmlSchema) -> LibXml2Result<Self> {
        if ptr.is_null() {
            return Err(LibXml2Error::SchemaParseFailed {
                details: "null pointer returned".to_string(),
            });
        }

        Ok(XmlSchemaPtr {
            inner: Arc::new(XmlSchemaInner {
                ptr,
                _phantom: PhantomData,
            }),
        })
    }

    pub(crate) fn as_ptr(&self) -> *const XmlSchema {
        self.inner.ptr
    }

    pub fn is_valid(&self) -> bool {
        !self.inner.ptr.is_null()
    }
}

impl Drop for XmlSchemaInner {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                xmlSchemaFree(self.ptr);
            }
            self.ptr = ptr::null_mut();
        }
    }
}

/// A well-formed document parsed by libxml2, freed on drop
#[derive(Debug)]
pub struct XmlDocument {
    ptr: *mut XmlDoc,
    source: PathBuf,
}

impl XmlDocument {
    /// Parses `path` with the default wrapper.
    pub fn parse_file(path: impl AsRef<Path>) -> LibXml2Result<Self> {
        LibXml2Wrapper::new().parse_document(path.as_ref())
    }

    /// File the document was read from
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn root_element(&self) -> Option<XmlElement<'_>> {
        let node = unsafe { xmlDocGetRootElement(self.ptr) };
        if node.is_null() {
            None
        } else {
            Some(XmlElement {
                node,
                document: self,
            })
        }
    }

    fn as_ptr(&self) -> *mut XmlDoc {
        self.ptr
    }
}

impl Drop for XmlDocument {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                xmlFreeDoc(self.ptr);
            }
            self.ptr = ptr::null_mut();
        }
    }
}

/// An element node borrowed from its owning [`XmlDocument`]
#[derive(Debug, Clone, Copy)]
pub struct XmlElement<'a> {
    node: *mut XmlNode,
    document: &'a XmlDocument,
}

impl<'a> XmlElement<'a> {
    pub fn document(&self) -> &'a XmlDocument {
        self.document
    }

    /// Local name of the element
    pub fn name(&self) -> String {
        let name = unsafe { (*self.node).name };
        if name.is_null() {
            return String::new();
        }
        unsafe { CStr::from_ptr(name as *const c_char) }
            .to_string_lossy()
            .into_owned()
    }
}

/// Outcome of validating one document against a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaOutcome {
    /// Validation succeeded (return code 0)
    Valid,
    /// Validation failed with errors (return code > 0)
    Invalid { error_count: i32, errors: Vec<String> },
    /// Internal error occurred (return code < 0)
    InternalError { code: i32 },
}

impl SchemaOutcome {
    pub fn from_code(code: c_int, errors: Vec<String>) -> Self {
        match code {
            0 => SchemaOutcome::Valid,
            n if n > 0 => SchemaOutcome::Invalid {
                error_count: n,
                errors,
            },
            n => SchemaOutcome::InternalError { code: n },
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, SchemaOutcome::Valid)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, SchemaOutcome::Invalid { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SchemaOutcome::InternalError { .. })
    }
}

/// Entry point for all libxml2 calls
///
/// Constructing one initializes libxml2 on first use; the wrapper itself
/// holds no state and is free to create per call.
pub struct LibXml2Wrapper {
    _phantom: PhantomData<()>,
}

impl LibXml2Wrapper {
    pub fn new() -> Self {
        LIBXML2_INIT.call_once(|| unsafe {
            xmlInitParser();
            xmlInitGlobals();
        });

        LibXml2Wrapper {
            _phantom: PhantomData,
        }
    }

    /// Parse an XML schema from memory buffer
    ///
    /// **IMPORTANT**: Schema parsing is NOT thread-safe in libxml2.
    /// This function should NOT be called concurrently from multiple threads.
    pub fn parse_schema_from_memory(&self, schema_data: &[u8]) -> LibXml2Result<XmlSchemaPtr> {
        let size = c_int::try_from(schema_data.len()).map_err(|_| LibXml2Error::MemoryAllocation)?;
        unsafe {
            let parser_ctxt =
                xmlSchemaNewMemParserCtxt(schema_data.as_ptr() as *const c_char, size);
            if parser_ctxt.is_null() {
                return Err(LibXml2Error::MemoryAllocation);
            }
            Self::compile_schema(parser_ctxt)
        }
    }

    /// Parse an XML schema from a file
    ///
    /// Relative `xs:include`/`xs:import` locations resolve against the
    /// schema file. Same threading caveat as [`Self::parse_schema_from_memory`].
    pub fn parse_schema_file(&self, path: &Path) -> LibXml2Result<XmlSchemaPtr> {
        let c_path = path_to_cstring(path)?;
        unsafe {
            let parser_ctxt = xmlSchemaNewParserCtxt(c_path.as_ptr());
            if parser_ctxt.is_null() {
                return Err(LibXml2Error::MemoryAllocation);
            }
            Self::compile_schema(parser_ctxt)
        }
    }

    /// Takes ownership of `parser_ctxt` and frees it.
    unsafe fn compile_schema(parser_ctxt: *mut XmlSchemaParserCtxt) -> LibXml2Result<XmlSchemaPtr> {
        let mut errors: Vec<String> = Vec::new();
        let errors_ptr = &mut errors as *mut Vec<String> as *mut c_void;

        unsafe {
            xmlSchemaSetParserStructuredErrors(
                parser_ctxt,
                Some(structured_error_callback),
                errors_ptr,
            );

            let schema_ptr = xmlSchemaParse(parser_ctxt);
            xmlSchemaFreeParserCtxt(parser_ctxt);

            if schema_ptr.is_null() {
                let details = if errors.is_empty() {
                    "null pointer returned".to_string()
                } else {
                    errors.join("; ")
                };
                return Err(LibXml2Error::SchemaParseFailed { details });
            }

            XmlSchemaPtr::from_raw(schema_ptr)
        }
    }

    /// Parse a document without overriding its declared encoding
    ///
    /// The file is read here rather than by libxml2, so a missing or
    /// unreadable file is [`LibXml2Error::Read`] and never a parse
    /// diagnostic. A document that is not well-formed yields
    /// [`LibXml2Error::NotWellFormed`] carrying libxml2's diagnostic.
    pub fn parse_document(&self, path: &Path) -> LibXml2Result<XmlDocument> {
        let bytes = std::fs::read(path).map_err(|source| LibXml2Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_document_bytes(&bytes, path)
    }

    /// Parse an in-memory document; `source` is its base URL and provenance.
    pub fn parse_document_bytes(&self, bytes: &[u8], source: &Path) -> LibXml2Result<XmlDocument> {
        let c_url = path_to_cstring(source)?;
        let size = c_int::try_from(bytes.len()).map_err(|_| LibXml2Error::DocumentTooLarge {
            path: source.to_path_buf(),
        })?;

        unsafe {
            let parser_ctxt = xmlNewParserCtxt();
            if parser_ctxt.is_null() {
                return Err(LibXml2Error::MemoryAllocation);
            }

            let doc = xmlCtxtReadMemory(
                parser_ctxt,
                bytes.as_ptr() as *const c_char,
                size,
                c_url.as_ptr(),
                ptr::null(),
                DOCUMENT_PARSE_OPTIONS,
            );

            if doc.is_null() {
                let error = Self::last_parse_error(parser_ctxt);
                xmlFreeParserCtxt(parser_ctxt);
                return Err(LibXml2Error::NotWellFormed(error));
            }

            xmlFreeParserCtxt(parser_ctxt);

            Ok(XmlDocument {
                ptr: doc,
                source: source.to_path_buf(),
            })
        }
    }

    unsafe fn last_parse_error(parser_ctxt: *mut XmlParserCtxt) -> ParseError {
        let error = unsafe { xmlCtxtGetLastError(parser_ctxt as *mut c_void) };
        if error.is_null() {
            return ParseError {
                code: -1,
                message: "unknown parse error".to_string(),
                line: 0,
                column: 0,
            };
        }

        let error = unsafe { &*error };
        let message = if error.message.is_null() {
            "unknown parse error".to_string()
        } else {
            unsafe { CStr::from_ptr(error.message) }
                .to_string_lossy()
                .trim()
                .to_string()
        };

        ParseError {
            code: error.code,
            message,
            line: error.line,
            column: error.int2,
        }
    }

    /// Validate a parsed document against a schema
    ///
    /// Safe to call concurrently for different documents: the schema is
    /// shared read-only and each call creates its own validation context.
    pub fn validate_document(
        &self,
        schema: &XmlSchemaPtr,
        document: &XmlDocument,
    ) -> LibXml2Result<SchemaOutcome> {
        unsafe {
            let valid_ctxt = xmlSchemaNewValidCtxt(schema.as_ptr());
            if valid_ctxt.is_null() {
                return Err(LibXml2Error::ValidationContextCreationFailed);
            }

            let mut errors = Vec::new();
            let errors_ptr = &mut errors as *mut Vec<String> as *mut c_void;

            xmlSchemaSetValidStructuredErrors(
                valid_ctxt,
                Some(structured_error_callback),
                errors_ptr,
            );

            let result_code = xmlSchemaValidateDoc(valid_ctxt, document.as_ptr());

            xmlSchemaFreeValidCtxt(valid_ctxt);

            match SchemaOutcome::from_code(result_code, errors) {
                SchemaOutcome::InternalError { code } => Err(LibXml2Error::ValidationFailed {
                    code,
                    file: document.source().to_path_buf(),
                }),
                outcome => Ok(outcome),
            }
        }
    }
}

impl Default for LibXml2Wrapper {
    fn default() -> Self {
        Self::new()
    }
}
